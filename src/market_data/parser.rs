//! Turns raw market-channel frames into [`VenueEvent`]s.
//!
//! [`MessageParser::decode`] is the entry point used on the hot path: it never
//! fails. Keep-alive replies are logged and dropped, anything else that does
//! not decode is logged together with its payload and dropped.

use tracing::{debug, error, info};

use crate::engine::types::{AggressorSide, Price, Side, Size};
use crate::market_data::adapters::polymarket_types::{
    WsBook, WsLastTradePrice, WsLevel, WsMarketMessage, WsPriceChange, WsSide, PONG,
};
use crate::market_data::adapters::{LevelChange, VenueEvent};
use crate::market_data::error::ParseError;
use crate::market_data::normaliser::Normaliser;

/// What a single frame turned out to be.
#[derive(Debug)]
pub enum FrameOutcome {
    Events(Vec<VenueEvent>),
    // Keep-alive acknowledgement, not data
    Control,
    Malformed(ParseError),
}

#[derive(Debug, Clone, Copy)]
pub struct MessageParser {
    normaliser: Normaliser,
}

impl MessageParser {
    pub fn new(normaliser: Normaliser) -> Self {
        Self { normaliser }
    }

    /// Strict parse of one frame. The venue sends either a single message
    /// object or an array of them.
    pub fn parse(&self, frame: &[u8]) -> Result<Vec<VenueEvent>, ParseError> {
        let messages: Vec<WsMarketMessage> = if frame.trim_ascii_start().first() == Some(&b'[') {
            serde_json::from_slice(frame)?
        } else {
            vec![serde_json::from_slice(frame)?]
        };

        let mut events = Vec::with_capacity(messages.len());
        for msg in messages {
            match msg {
                WsMarketMessage::Book(book) => events.push(self.book(book)?),
                WsMarketMessage::PriceChange(pc) => events.extend(self.price_change(pc)?),
                WsMarketMessage::LastTradePrice(trade) => events.push(self.trade(trade)?),
                WsMarketMessage::Other => debug!("Ignoring market message without book data"),
            }
        }
        Ok(events)
    }

    pub fn classify(&self, frame: &[u8]) -> FrameOutcome {
        match self.parse(frame) {
            Ok(events) => FrameOutcome::Events(events),
            Err(_) if frame.trim_ascii() == PONG => FrameOutcome::Control,
            Err(e) => FrameOutcome::Malformed(e),
        }
    }

    /// Like [`parse`](Self::parse) but degrades every failure to "no events".
    pub fn decode(&self, frame: &[u8]) -> Vec<VenueEvent> {
        match self.classify(frame) {
            FrameOutcome::Events(events) => events,
            FrameOutcome::Control => {
                info!("Received PONG");
                metrics::counter!("pmfeed_control_frames_total").increment(1);
                Vec::new()
            }
            FrameOutcome::Malformed(e) => {
                error!(
                    payload = %String::from_utf8_lossy(frame),
                    error = %e,
                    "Failed to parse market message"
                );
                metrics::counter!("pmfeed_parse_failures_total").increment(1);
                Vec::new()
            }
        }
    }

    fn book(&self, book: WsBook) -> Result<VenueEvent, ParseError> {
        Ok(VenueEvent::BookSnapshot {
            bids: self.levels(&book.bids)?,
            asks: self.levels(&book.asks)?,
            ts_ms: parse_ts(&book.timestamp)?,
            market: book.market,
            asset: book.asset_id,
        })
    }

    fn levels(&self, levels: &[WsLevel]) -> Result<Vec<(Price, Size)>, ParseError> {
        levels
            .iter()
            .map(|l| Ok((self.price(&l.price)?, self.size(&l.size)?)))
            .collect()
    }

    // One message may carry changes for several assets of the same market;
    // they are split into one event per asset, in order of first appearance.
    fn price_change(&self, pc: WsPriceChange) -> Result<Vec<VenueEvent>, ParseError> {
        let ts_ms = parse_ts(&pc.timestamp)?;
        let mut grouped: Vec<(String, Vec<LevelChange>)> = Vec::new();

        for item in pc.price_changes {
            let asset = item
                .asset_id
                .or_else(|| pc.asset_id.clone())
                .ok_or_else(|| ParseError::MissingAssetId { market: pc.market.clone() })?;
            let change = LevelChange {
                side: match item.side {
                    WsSide::Buy => Side::Bid,
                    WsSide::Sell => Side::Ask,
                },
                price: self.price(&item.price)?,
                size: self.size(&item.size)?,
            };
            match grouped.iter_mut().find(|(a, _)| *a == asset) {
                Some((_, changes)) => changes.push(change),
                None => grouped.push((asset, vec![change])),
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(asset, changes)| VenueEvent::QuoteUpdate {
                market: pc.market.clone(),
                asset,
                changes,
                ts_ms,
            })
            .collect())
    }

    fn trade(&self, trade: WsLastTradePrice) -> Result<VenueEvent, ParseError> {
        Ok(VenueEvent::Trade {
            price: self.price(&trade.price)?,
            size: self.size(&trade.size)?,
            aggressor: match trade.side {
                WsSide::Buy => AggressorSide::Buyer,
                WsSide::Sell => AggressorSide::Seller,
            },
            ts_ms: parse_ts(&trade.timestamp)?,
            market: trade.market,
            asset: trade.asset_id,
        })
    }

    fn price(&self, s: &str) -> Result<Price, ParseError> {
        self.normaliser.price_to_ticks(s).map_err(|source| ParseError::Number {
            field: "price",
            value: s.to_string(),
            source,
        })
    }

    fn size(&self, s: &str) -> Result<Size, ParseError> {
        self.normaliser.size_to_lots(s).map_err(|source| ParseError::Number {
            field: "size",
            value: s.to_string(),
            source,
        })
    }
}

// Venue timestamps are epoch milliseconds
fn parse_ts(s: &str) -> Result<u64, ParseError> {
    s.trim().parse().map_err(|_| ParseError::Timestamp(s.to_string()))
}
