use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::engine::types::{InstrumentId, Quote};

// Last emitted top-of-book per instrument; suppresses repeats
#[derive(Debug, Default)]
pub struct QuoteDeduplicator {
    last_quotes: Mutex<AHashMap<InstrumentId, Quote>>,
}

impl QuoteDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the quote if it should be emitted, recording it as the last one.
    ///
    /// Suppressed only when bid price, bid size, ask price and ask size all
    /// match the previous emission for the same instrument.
    pub fn observe(&self, quote: Quote) -> Option<Quote> {
        let mut last_quotes = self.last_quotes.lock();
        if let Some(last) = last_quotes.get(&quote.instrument_id) {
            if last.same_top(&quote) {
                trace!(instrument = %quote.instrument_id, "No top-of-book change");
                return None;
            }
        }
        last_quotes.insert(quote.instrument_id.clone(), quote.clone());
        Some(quote)
    }

    pub fn last(&self, instrument_id: &InstrumentId) -> Option<Quote> {
        self.last_quotes.lock().get(instrument_id).cloned()
    }

    pub fn clear(&self) {
        self.last_quotes.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(id: &str, bid_price: i64, bid_size: u64, ask_price: i64, ask_size: u64) -> Quote {
        Quote { instrument_id: InstrumentId::new(id), bid_price, bid_size, ask_price, ask_size, ts_ms: 0 }
    }

    #[test]
    fn test_first_quote_is_emitted() {
        let dedup = QuoteDeduplicator::new();
        assert!(dedup.observe(quote("A", 50, 10, 60, 5)).is_some());
        assert_eq!(dedup.last(&InstrumentId::new("A")), Some(quote("A", 50, 10, 60, 5)));
    }

    #[test]
    fn test_identical_top_is_suppressed() {
        let dedup = QuoteDeduplicator::new();
        assert!(dedup.observe(quote("A", 50, 10, 60, 5)).is_some());
        let mut repeat = quote("A", 50, 10, 60, 5);
        repeat.ts_ms = 99;
        assert!(dedup.observe(repeat).is_none());
    }

    #[test]
    fn test_any_single_field_change_is_emitted() {
        let base = quote("A", 50, 10, 60, 5);
        let variants = [
            quote("A", 51, 10, 60, 5),
            quote("A", 50, 11, 60, 5),
            quote("A", 50, 10, 61, 5),
            quote("A", 50, 10, 60, 6),
        ];
        for changed in variants {
            let dedup = QuoteDeduplicator::new();
            dedup.observe(base.clone());
            assert_eq!(dedup.observe(changed.clone()), Some(changed));
        }
    }

    #[test]
    fn test_instruments_are_independent() {
        let dedup = QuoteDeduplicator::new();
        assert!(dedup.observe(quote("A", 50, 10, 60, 5)).is_some());
        assert!(dedup.observe(quote("B", 50, 10, 60, 5)).is_some());
        assert!(dedup.observe(quote("A", 50, 10, 60, 5)).is_none());
    }
}
