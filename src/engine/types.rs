use std::fmt;
use std::sync::Arc;

// Fixed-precision integers: price in ticks, size in lots (see Normaliser)
pub type Price = i64;
pub type Size = u64;

pub const VENUE: &str = "POLYMARKET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Bid,
    Ask,
}

// Side of the taker in a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggressorSide {
    Buyer,
    Seller,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookType {
    L1_MBP,
    L2_MBP,
    L3_MBO,
}

/// Identifier of a tradable outcome token, `{market}-{asset}.POLYMARKET`.
///
/// Backed by `Arc<str>` since every delta record carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(Arc<str>);

impl InstrumentId {
    pub fn new(value: &str) -> Self {
        Self(Arc::from(value))
    }

    pub fn from_venue(market: &str, asset: &str) -> Self {
        Self::new(&format!("{market}-{asset}.{VENUE}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Reference data for one outcome token of a binary market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub id: InstrumentId,
    pub market: String,  // condition id
    pub asset: String,   // CLOB token id
    pub outcome: Option<String>,
}

impl Instrument {
    pub fn new(market: &str, asset: &str, outcome: Option<&str>) -> Self {
        Self {
            id: InstrumentId::from_venue(market, asset),
            market: market.to_string(),
            asset: asset.to_string(),
            outcome: outcome.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarType {
    pub instrument_id: InstrumentId,
    pub spec: String, // e.g. "1-MINUTE-LAST"
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instrument_id, self.spec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaAction {
    Add,
    Update,
    Delete,
}

// One level-level change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDelta {
    pub instrument_id: InstrumentId,
    pub action: DeltaAction,
    pub side: Side,
    pub price: Price,
    pub size: Size,
}

/// An atomic book transition for a single instrument.
///
/// When `is_snapshot` is set the records are a full re-send and the receiver
/// must clear its book before applying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSet {
    pub instrument_id: InstrumentId,
    pub deltas: Vec<BookDelta>,
    pub is_snapshot: bool,
    pub ts_ms: u64,
}

impl DeltaSet {
    pub fn new(instrument_id: InstrumentId, deltas: Vec<BookDelta>, ts_ms: u64) -> Self {
        Self { instrument_id, deltas, is_snapshot: false, ts_ms }
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

// Best bid/ask; a missing side is (0, 0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOfBook {
    pub bid_price: Price,
    pub bid_size: Size,
    pub ask_price: Price,
    pub ask_size: Size,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub instrument_id: InstrumentId,
    pub bid_price: Price,
    pub bid_size: Size,
    pub ask_price: Price,
    pub ask_size: Size,
    pub ts_ms: u64,
}

impl Quote {
    pub fn from_top(instrument_id: InstrumentId, top: TopOfBook, ts_ms: u64) -> Self {
        Self {
            instrument_id,
            bid_price: top.bid_price,
            bid_size: top.bid_size,
            ask_price: top.ask_price,
            ask_size: top.ask_size,
            ts_ms,
        }
    }

    // Compares the four book fields only, timestamps are ignored
    pub fn same_top(&self, other: &Quote) -> bool {
        self.bid_price == other.bid_price
            && self.bid_size == other.bid_size
            && self.ask_price == other.ask_price
            && self.ask_size == other.ask_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub instrument_id: InstrumentId,
    pub price: Price,
    pub size: Size,
    pub aggressor: AggressorSide,
    pub ts_ms: u64,
}

// Normalized output published to the host's bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    Deltas(DeltaSet),
    Quote(Quote),
    Trade(Trade),
    Instrument(Instrument),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id_from_venue() {
        let id = InstrumentId::from_venue("0xabc", "123");
        assert_eq!(id.as_str(), "0xabc-123.POLYMARKET");
        assert_eq!(id.to_string(), "0xabc-123.POLYMARKET");
        assert_eq!(Instrument::new("0xabc", "123", Some("Yes")).id, id);
    }

    #[test]
    fn test_quote_same_top_ignores_timestamp() {
        let id = InstrumentId::new("X");
        let top = TopOfBook { bid_price: 50, bid_size: 10, ask_price: 60, ask_size: 5 };
        let a = Quote::from_top(id.clone(), top, 1);
        let b = Quote::from_top(id.clone(), top, 2);
        assert!(a.same_top(&b));

        let c = Quote { ask_size: 6, ..b };
        assert!(!a.same_top(&c));
    }
}
