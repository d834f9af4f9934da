// Shared traits + events for venue transports
use std::sync::Arc;

use crate::engine::types::{AggressorSide, Price, Side, Size};

/// Typed venue events, already normalized to ticks/lots but still keyed by
/// the venue's own market and asset ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueEvent {
    // Full book at a point in time
    BookSnapshot {
        market: String,
        asset: String,
        bids: Vec<(Price, Size)>, // (price_ticks, size_lots)
        asks: Vec<(Price, Size)>,
        ts_ms: u64,
    },
    // Incremental level changes; size 0 removes the level
    QuoteUpdate {
        market: String,
        asset: String,
        changes: Vec<LevelChange>,
        ts_ms: u64,
    },
    Trade {
        market: String,
        asset: String,
        price: Price,
        size: Size,
        aggressor: AggressorSide,
        ts_ms: u64,
    },
}

impl VenueEvent {
    pub fn venue_ids(&self) -> (&str, &str) {
        match self {
            VenueEvent::BookSnapshot { market, asset, .. }
            | VenueEvent::QuoteUpdate { market, asset, .. }
            | VenueEvent::Trade { market, asset, .. } => (market, asset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub side: Side,
    pub price: Price,
    pub size: Size,
}

// Called with every raw frame a transport receives
pub type FrameHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// One transport session carrying a fixed set of subscribed tokens.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;
    fn is_connected(&self) -> bool;
    // Idempotent; only meaningful before connect
    fn subscribe(&self, token: &str);
}

pub trait TransportFactory: Send + Sync {
    fn create(&self, handler: FrameHandler) -> Arc<dyn Transport>;
}

pub mod polymarket;
pub mod polymarket_types;

#[cfg(test)]
pub mod mock;
