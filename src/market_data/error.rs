use thiserror::Error;

use crate::engine::types::BookType;
use crate::market_data::normaliser::NormaliseError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad {field} `{value}`: {source}")]
    Number {
        field: &'static str,
        value: String,
        #[source]
        source: NormaliseError,
    },
    #[error("bad timestamp `{0}`")]
    Timestamp(String),
    #[error("price change for market {market} has no asset id")]
    MissingAssetId { market: String },
}

/// Synchronous rejections returned to callers of the data client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{operation} is not supported by Polymarket")]
    Unsupported { operation: String },
    #[error("book type {0:?} is not supported, use L1_MBP or L2_MBP")]
    UnsupportedBookType(BookType),
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),
}

impl ClientError {
    pub fn unsupported(operation: &str) -> Self {
        Self::Unsupported { operation: operation.to_string() }
    }
}
