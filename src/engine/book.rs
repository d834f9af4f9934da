use std::collections::BTreeMap;

use tracing::{instrument, trace};

use crate::engine::types::{DeltaAction, DeltaSet, Price, Side, Size, TopOfBook};

/// L2 image of one instrument's book: price -> aggregate size per side.
///
/// Levels are keyed by price so iteration order is price order, never arrival
/// order. A stored level never has size 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookImage {
    bids: BTreeMap<Price, Size>, // highest price = best bid
    asks: BTreeMap<Price, Size>, // lowest price  = best ask
    pub ts_ms: u64,
}

impl BookImage {
    pub fn new() -> Self {
        Self::default()
    }

    // Build from snapshot levels; zero sizes are dropped, duplicate prices keep the last
    pub fn from_levels(bids: &[(Price, Size)], asks: &[(Price, Size)], ts_ms: u64) -> Self {
        let mut book = Self { ts_ms, ..Self::default() };
        for &(p, s) in bids {
            book.set_level(Side::Bid, p, s);
        }
        for &(p, s) in asks {
            book.set_level(Side::Ask, p, s);
        }
        book
    }

    pub fn side(&self, side: Side) -> &BTreeMap<Price, Size> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn bids(&self) -> &BTreeMap<Price, Size> {
        &self.bids
    }

    pub fn asks(&self) -> &BTreeMap<Price, Size> {
        &self.asks
    }

    pub fn set_level(&mut self, side: Side, price: Price, size: Size) {
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if size == 0 {
            levels.remove(&price);
        } else {
            levels.insert(price, size);
        }
    }

    /// Applies a delta set in place. A snapshot set clears the book first.
    #[instrument(level = "trace", skip_all, fields(instrument = %deltas.instrument_id, n = deltas.len()))]
    pub fn apply(&mut self, deltas: &DeltaSet) {
        if deltas.is_snapshot {
            self.bids.clear();
            self.asks.clear();
        }
        for delta in &deltas.deltas {
            match delta.action {
                DeltaAction::Add | DeltaAction::Update => {
                    self.set_level(delta.side, delta.price, delta.size)
                }
                DeltaAction::Delete => self.set_level(delta.side, delta.price, 0),
            }
        }
        if deltas.ts_ms > self.ts_ms {
            self.ts_ms = deltas.ts_ms;
        }
        trace!(bids = self.bids.len(), asks = self.asks.len(), "Applied deltas");
    }

    pub fn best_bid(&self) -> Option<(Price, Size)> {
        self.bids.iter().next_back().map(|(p, s)| (*p, *s))
    }

    pub fn best_ask(&self) -> Option<(Price, Size)> {
        self.asks.iter().next().map(|(p, s)| (*p, *s))
    }

    pub fn top_of_book(&self) -> TopOfBook {
        let (bid_price, bid_size) = self.best_bid().unwrap_or_default();
        let (ask_price, ask_size) = self.best_ask().unwrap_or_default();
        TopOfBook { bid_price, bid_size, ask_price, ask_size }
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
