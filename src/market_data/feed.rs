// Per-frame pipeline: parse -> resolve -> reduce/apply -> dedup -> publish
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashSet;
use parking_lot::RwLock;
use tracing::{debug, error, instrument, trace};

use crate::engine::book::BookImage;
use crate::engine::deltas::{reduce, snapshot_deltas};
use crate::engine::quotes::QuoteDeduplicator;
use crate::engine::shadow::ShadowStore;
use crate::engine::types::{
    BookDelta, DataEvent, DeltaAction, DeltaSet, InstrumentId, Price, Quote, Size, TopOfBook, Trade,
};
use crate::market_data::adapters::{LevelChange, VenueEvent};
use crate::market_data::instruments::InstrumentResolver;
use crate::market_data::parser::MessageParser;
use crate::market_data::sink::EventSink;

/// Owns the shadow books and last quotes for one data client.
///
/// Every transport of the client feeds frames into the same handler, so all
/// state is behind locks and `handle_frame` takes `&self`.
pub struct FeedHandler {
    parser: MessageParser,
    resolver: Arc<dyn InstrumentResolver>,
    sink: Arc<dyn EventSink>,
    shadow: ShadowStore,
    quotes: QuoteDeduplicator,
    quote_subscriptions: RwLock<AHashSet<InstrumentId>>,
    compute_effective_deltas: bool,
}

impl FeedHandler {
    pub fn new(
        parser: MessageParser,
        resolver: Arc<dyn InstrumentResolver>,
        sink: Arc<dyn EventSink>,
        compute_effective_deltas: bool,
    ) -> Self {
        Self {
            parser,
            resolver,
            sink,
            shadow: ShadowStore::new(),
            quotes: QuoteDeduplicator::new(),
            quote_subscriptions: RwLock::new(AHashSet::new()),
            compute_effective_deltas,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn InstrumentResolver> {
        &self.resolver
    }

    pub fn publish(&self, event: DataEvent) {
        self.sink.publish(event);
    }

    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    pub fn quotes(&self) -> &QuoteDeduplicator {
        &self.quotes
    }

    pub fn subscribe_quotes(&self, instrument_id: &InstrumentId) {
        self.quote_subscriptions.write().insert(instrument_id.clone());
    }

    pub fn is_quote_subscribed(&self, instrument_id: &InstrumentId) -> bool {
        self.quote_subscriptions.read().contains(instrument_id)
    }

    // Drop all per-instrument state, used on disconnect
    pub fn reset(&self) {
        self.shadow.clear();
        self.quotes.clear();
        self.quote_subscriptions.write().clear();
    }

    /// Frame handler registered with every transport.
    pub fn handle_frame(&self, frame: &[u8]) {
        metrics::counter!("pmfeed_frames_received_total").increment(1);
        for event in self.parser.decode(frame) {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&self, event: VenueEvent) {
        let (market, asset) = event.venue_ids();
        let Some(instrument_id) = self.resolver.resolve(market, asset) else {
            error!(market, asset, "Cannot find instrument");
            metrics::counter!("pmfeed_resolution_misses_total").increment(1);
            return;
        };

        match event {
            VenueEvent::BookSnapshot { bids, asks, ts_ms, .. } => {
                self.on_snapshot(&instrument_id, &bids, &asks, ts_ms)
            }
            VenueEvent::QuoteUpdate { changes, ts_ms, .. } => {
                self.on_quote_update(&instrument_id, &changes, ts_ms)
            }
            VenueEvent::Trade { price, size, aggressor, ts_ms, .. } => {
                metrics::counter!("pmfeed_trades_published_total").increment(1);
                self.sink.publish(DataEvent::Trade(Trade {
                    instrument_id,
                    price,
                    size,
                    aggressor,
                    ts_ms,
                }));
            }
        }
    }

    #[instrument(level = "trace", skip_all, fields(instrument = %instrument_id))]
    fn on_snapshot(
        &self,
        instrument_id: &InstrumentId,
        bids: &[(Price, Size)],
        asks: &[(Price, Size)],
        ts_ms: u64,
    ) {
        let image = BookImage::from_levels(bids, asks, ts_ms);
        let top = image.top_of_book();

        let deltas = if self.compute_effective_deltas {
            let t0 = Instant::now();
            let deltas = self
                .shadow
                .replace_with(instrument_id, image, |old, new| reduce(old, new, instrument_id));
            let elapsed = t0.elapsed();
            metrics::histogram!("pmfeed_effective_delta_seconds").record(elapsed.as_secs_f64());
            debug!(
                elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
                deltas = deltas.len(),
                "Computed effective deltas"
            );
            deltas
        } else {
            let deltas = snapshot_deltas(&image, instrument_id);
            self.shadow.put(instrument_id.clone(), image);
            deltas
        };
        self.publish_deltas(deltas);

        if self.is_quote_subscribed(instrument_id) {
            self.publish_quote(instrument_id, top, ts_ms);
        }
    }

    #[instrument(level = "trace", skip_all, fields(instrument = %instrument_id))]
    fn on_quote_update(&self, instrument_id: &InstrumentId, changes: &[LevelChange], ts_ms: u64) {
        let deltas = changes
            .iter()
            .map(|c| BookDelta {
                instrument_id: instrument_id.clone(),
                action: if c.size == 0 { DeltaAction::Delete } else { DeltaAction::Update },
                side: c.side,
                price: c.price,
                size: c.size,
            })
            .collect();
        let deltas = DeltaSet::new(instrument_id.clone(), deltas, ts_ms);

        // No shadow yet means no snapshot has arrived, so there is no top of book
        let top = self.shadow.apply(&deltas);
        self.publish_deltas(deltas);

        match top {
            Some(top) if self.is_quote_subscribed(instrument_id) => {
                self.publish_quote(instrument_id, top, ts_ms)
            }
            _ => {}
        }
    }

    fn publish_deltas(&self, deltas: DeltaSet) {
        if deltas.is_empty() {
            trace!(instrument = %deltas.instrument_id, "No effective deltas");
            metrics::counter!("pmfeed_deltas_suppressed_total").increment(1);
            return;
        }
        metrics::counter!("pmfeed_delta_sets_published_total").increment(1);
        self.sink.publish(DataEvent::Deltas(deltas));
    }

    fn publish_quote(&self, instrument_id: &InstrumentId, top: TopOfBook, ts_ms: u64) {
        match self.quotes.observe(Quote::from_top(instrument_id.clone(), top, ts_ms)) {
            Some(quote) => {
                metrics::counter!("pmfeed_quotes_published_total").increment(1);
                self.sink.publish(DataEvent::Quote(quote));
            }
            None => {
                metrics::counter!("pmfeed_quotes_suppressed_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{AggressorSide, Instrument, Side};
    use crate::market_data::instruments::StaticInstrumentResolver;
    use crate::market_data::normaliser::Normaliser;
    use crate::market_data::sink::RecordingSink;

    fn setup(compute_effective_deltas: bool) -> (FeedHandler, Arc<RecordingSink>, InstrumentId) {
        let resolver = StaticInstrumentResolver::new([Instrument::new("0xm", "1", Some("Yes"))]);
        let sink = Arc::new(RecordingSink::new());
        let feed = FeedHandler::new(
            MessageParser::new(Normaliser::new(2, 0)),
            Arc::new(resolver),
            sink.clone(),
            compute_effective_deltas,
        );
        (feed, sink, InstrumentId::from_venue("0xm", "1"))
    }

    fn book_frame(asset: &str, bids: &str, asks: &str) -> Vec<u8> {
        format!(
            r#"{{"event_type":"book","market":"0xm","asset_id":"{asset}","timestamp":"1","bids":[{bids}],"asks":[{asks}]}}"#
        )
        .into_bytes()
    }

    fn change_frame(changes: &str) -> Vec<u8> {
        format!(r#"{{"event_type":"price_change","market":"0xm","timestamp":"2","price_changes":[{changes}]}}"#)
            .into_bytes()
    }

    fn level(price: &str, size: &str) -> String {
        format!(r#"{{"price":"{price}","size":"{size}"}}"#)
    }

    fn deltas_of(events: &[DataEvent]) -> Vec<&DeltaSet> {
        events
            .iter()
            .filter_map(|e| match e {
                DataEvent::Deltas(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn quotes_of(events: &[DataEvent]) -> Vec<&Quote> {
        events
            .iter()
            .filter_map(|e| match e {
                DataEvent::Quote(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_snapshot_emits_only_effective_deltas() {
        let (feed, sink, id) = setup(true);

        feed.handle_frame(&book_frame("1", &level("0.50", "100"), ""));
        let first = sink.take();
        assert_eq!(deltas_of(&first)[0].len(), 1);

        let bids = format!("{},{}", level("0.50", "100"), level("0.49", "50"));
        feed.handle_frame(&book_frame("1", &bids, ""));
        let events = sink.take();
        let deltas = deltas_of(&events);
        assert_eq!(deltas.len(), 1);
        assert_eq!(
            deltas[0].deltas,
            vec![BookDelta {
                instrument_id: id,
                action: DeltaAction::Add,
                side: Side::Bid,
                price: 49,
                size: 50,
            }]
        );
        assert!(!deltas[0].is_snapshot);
    }

    #[test]
    fn test_identical_snapshot_publishes_nothing() {
        let (feed, sink, _) = setup(true);
        let frame = book_frame("1", &level("0.50", "100"), &level("0.60", "10"));
        feed.handle_frame(&frame);
        sink.take();
        feed.handle_frame(&frame);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_disabled_reduction_publishes_full_snapshot() {
        let (feed, sink, id) = setup(false);
        let frame = book_frame("1", &level("0.50", "100"), &level("0.60", "10"));
        feed.handle_frame(&frame);
        feed.handle_frame(&frame);
        let events = sink.take();
        let deltas = deltas_of(&events);
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.is_snapshot && d.len() == 2));
        // Shadow still tracked for quotes
        assert!(feed.shadow().contains(&id));
    }

    #[test]
    fn test_quote_dedup_across_updates() {
        let (feed, sink, id) = setup(true);
        feed.subscribe_quotes(&id);

        feed.handle_frame(&book_frame("1", &level("0.50", "100"), &level("0.60", "10")));
        let events = sink.take();
        let quotes = quotes_of(&events);
        assert_eq!(quotes.len(), 1);
        assert_eq!((quotes[0].bid_price, quotes[0].ask_size), (50, 10));

        // Deeper level changes: deltas published, top unchanged so no quote
        feed.handle_frame(&change_frame(r#"{"asset_id":"1","price":"0.40","size":"5","side":"BUY"}"#));
        let events = sink.take();
        assert_eq!(deltas_of(&events).len(), 1);
        assert!(quotes_of(&events).is_empty());

        // Best ask size changes
        feed.handle_frame(&change_frame(r#"{"asset_id":"1","price":"0.60","size":"7","side":"SELL"}"#));
        let events = sink.take();
        let quotes = quotes_of(&events);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].ask_size, 7);
    }

    #[test]
    fn test_quote_update_removes_level() {
        let (feed, sink, id) = setup(true);
        feed.subscribe_quotes(&id);
        feed.handle_frame(&book_frame("1", "", &level("0.60", "10")));
        sink.take();

        feed.handle_frame(&change_frame(r#"{"asset_id":"1","price":"0.60","size":"0","side":"SELL"}"#));
        let events = sink.take();
        assert_eq!(deltas_of(&events)[0].deltas[0].action, DeltaAction::Delete);
        let quotes = quotes_of(&events);
        assert_eq!(quotes.len(), 1);
        assert_eq!((quotes[0].ask_price, quotes[0].ask_size), (0, 0));
        assert!(feed.shadow().get(&id).unwrap().is_empty());
    }

    #[test]
    fn test_update_before_snapshot_emits_no_quote() {
        let (feed, sink, id) = setup(true);
        feed.subscribe_quotes(&id);
        feed.handle_frame(&change_frame(r#"{"asset_id":"1","price":"0.50","size":"5","side":"BUY"}"#));
        let events = sink.take();
        assert_eq!(deltas_of(&events).len(), 1);
        assert!(quotes_of(&events).is_empty());
        assert!(!feed.shadow().contains(&id));
    }

    #[test]
    fn test_trade_published() {
        let (feed, sink, id) = setup(true);
        feed.handle_frame(
            br#"{"event_type":"last_trade_price","market":"0xm","asset_id":"1","price":"0.55","size":"3","side":"BUY","timestamp":"9"}"#,
        );
        assert_eq!(
            sink.take(),
            vec![DataEvent::Trade(Trade {
                instrument_id: id,
                price: 55,
                size: 3,
                aggressor: AggressorSide::Buyer,
                ts_ms: 9,
            })]
        );
    }

    #[test]
    fn test_resolution_miss_drops_only_that_event() {
        let (feed, sink, _) = setup(true);
        let frame = format!(
            "[{},{}]",
            String::from_utf8(book_frame("unknown", &level("0.5", "1"), "")).unwrap(),
            String::from_utf8(book_frame("1", &level("0.5", "1"), "")).unwrap(),
        );
        feed.handle_frame(frame.as_bytes());
        let events = sink.take();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DataEvent::Deltas(d) if d.instrument_id.as_str() == "0xm-1.POLYMARKET"));
    }

    #[test]
    fn test_malformed_frames_publish_nothing() {
        let (feed, sink, _) = setup(true);
        feed.handle_frame(b"not-json");
        feed.handle_frame(b"PONG");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_reset_clears_state() {
        let (feed, sink, id) = setup(true);
        feed.subscribe_quotes(&id);
        feed.handle_frame(&book_frame("1", &level("0.50", "100"), ""));
        assert_eq!(sink.take().len(), 2);

        feed.reset();
        assert!(feed.shadow().is_empty());
        assert!(feed.quotes().last(&id).is_none());
        assert!(!feed.is_quote_subscribed(&id));
    }
}
