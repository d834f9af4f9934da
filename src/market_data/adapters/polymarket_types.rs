// Source: wss://ws-subscriptions-clob.polymarket.com/ws/market (market channel)
use serde::{Deserialize, Deserializer};

// Keep-alive reply to our "PING" text frames
pub const PONG: &[u8] = b"PONG";

// Prices, sizes and timestamps usually arrive as strings but sometimes as numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum WsMarketMessage {
    Book(WsBook),
    PriceChange(WsPriceChange),
    LastTradePrice(WsLastTradePrice),
    // tick_size_change and anything newer carries no book data
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct WsBook {
    pub market: String,
    pub asset_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(alias = "buys", default)]
    pub bids: Vec<WsLevel>,
    #[serde(alias = "sells", default)]
    pub asks: Vec<WsLevel>,
}

#[derive(Debug, Deserialize)]
pub struct WsLevel {
    #[serde(deserialize_with = "string_or_number")]
    pub price: String, // e.g. "0.48"
    #[serde(deserialize_with = "string_or_number")]
    pub size: String, // e.g. "219.217767"
}

#[derive(Debug, Deserialize)]
pub struct WsPriceChange {
    pub market: String,
    // Older payloads put a single asset id on the message instead of each change
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(alias = "changes")]
    pub price_changes: Vec<WsPriceChangeItem>,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct WsPriceChangeItem {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
    pub side: WsSide,
}

#[derive(Debug, Deserialize)]
pub struct WsLastTradePrice {
    pub market: String,
    pub asset_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
    pub side: WsSide,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WsSide {
    Buy,
    Sell,
}
