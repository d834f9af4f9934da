//! Polymarket live data client.
//!
//! Ties the feed handler (parsing, shadow books, quote dedup) to the
//! connection manager (batched, staggered transports) and exposes the
//! subscribe/request surface a trading host expects. Capabilities the venue
//! does not offer are rejected with [`ClientError`] instead of being ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::DataClientConfig;
use crate::engine::types::{BarType, BookType, DataEvent, Instrument, InstrumentId};
use crate::market_data::adapters::{FrameHandler, TransportFactory};
use crate::market_data::connections::{ConnectionDelays, ConnectionManager};
use crate::market_data::error::ClientError;
use crate::market_data::feed::FeedHandler;
use crate::market_data::instruments::InstrumentResolver;
use crate::market_data::normaliser::Normaliser;
use crate::market_data::parser::MessageParser;
use crate::market_data::sink::EventSink;

pub type ClientResult<T> = Result<T, ClientError>;

pub struct PolymarketDataClient {
    feed: Arc<FeedHandler>,
    connections: ConnectionManager,
    is_connected: AtomicBool,
}

impl PolymarketDataClient {
    pub fn new(
        config: DataClientConfig,
        resolver: Arc<dyn InstrumentResolver>,
        sink: Arc<dyn EventSink>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        info!(
            base_url_ws = %config.base_url_ws,
            initial_delay_secs = config.ws_connection_initial_delay_secs,
            delay_secs = config.ws_connection_delay_secs,
            compute_effective_deltas = config.compute_effective_deltas,
            price_precision = config.price_precision,
            size_precision = config.size_precision,
            "Polymarket data client configured"
        );

        let parser = MessageParser::new(Normaliser::new(config.price_precision, config.size_precision));
        let feed = Arc::new(FeedHandler::new(
            parser,
            resolver,
            sink,
            config.compute_effective_deltas,
        ));

        let frame_feed = Arc::clone(&feed);
        let handler: FrameHandler = Arc::new(move |frame: &[u8]| frame_feed.handle_frame(frame));
        let connections = ConnectionManager::new(
            factory,
            handler,
            ConnectionDelays::from_secs(
                config.ws_connection_initial_delay_secs,
                config.ws_connection_delay_secs,
            ),
        );

        Self {
            feed,
            connections,
            is_connected: AtomicBool::new(false),
        }
    }

    pub fn feed(&self) -> &Arc<FeedHandler> {
        &self.feed
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    /// Publishes every known instrument. Transports open lazily on subscribe.
    pub async fn connect(&self) {
        let instruments = self.feed.resolver().all();
        info!(count = instruments.len(), "Publishing instruments");
        for instrument in instruments {
            self.feed.publish(DataEvent::Instrument(instrument));
        }
        self.is_connected.store(true, Ordering::Release);
    }

    /// Cancels pending connects, closes all transports and forgets all
    /// per-instrument state.
    pub async fn disconnect(&self) {
        self.connections.shutdown().await;
        self.feed.reset();
        self.is_connected.store(false, Ordering::Release);
        info!("Polymarket data client disconnected");
    }

    fn instrument(&self, instrument_id: &InstrumentId) -> ClientResult<Instrument> {
        self.feed.resolver().find(instrument_id).ok_or_else(|| {
            error!(instrument = %instrument_id, "Cannot find instrument");
            ClientError::UnknownInstrument(instrument_id.to_string())
        })
    }

    // All data types ride on the same market channel subscription
    fn subscribe_asset(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        let instrument = self.instrument(instrument_id)?;
        self.connections.subscribe(instrument_id, &instrument.asset);
        Ok(())
    }

    pub async fn subscribe_book_deltas(&self, instrument_id: &InstrumentId, book_type: BookType) -> ClientResult<()> {
        if book_type == BookType::L3_MBO {
            error!(
                instrument = %instrument_id,
                "L3_MBO data is not published by Polymarket, valid book types are L1_MBP, L2_MBP"
            );
            return Err(ClientError::UnsupportedBookType(book_type));
        }
        self.subscribe_asset(instrument_id)
    }

    pub async fn subscribe_quotes(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        self.subscribe_asset(instrument_id)?;
        self.feed.subscribe_quotes(instrument_id);
        Ok(())
    }

    pub async fn subscribe_trades(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        self.subscribe_asset(instrument_id)
    }

    pub async fn subscribe_bars(&self, bar_type: &BarType) -> ClientResult<()> {
        Err(self.reject(format!("subscribing to {bar_type} bars")))
    }

    pub async fn unsubscribe_book_deltas(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject(format!("unsubscribing from {instrument_id} order book deltas")))
    }

    pub async fn unsubscribe_book_snapshots(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject(format!("unsubscribing from {instrument_id} order book snapshots")))
    }

    pub async fn unsubscribe_quotes(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject(format!("unsubscribing from {instrument_id} quotes")))
    }

    pub async fn unsubscribe_trades(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject(format!("unsubscribing from {instrument_id} trades")))
    }

    pub async fn unsubscribe_bars(&self, bar_type: &BarType) -> ClientResult<()> {
        Err(self.reject(format!("unsubscribing from {bar_type} bars")))
    }

    pub async fn request_instrument(&self, instrument_id: &InstrumentId) -> ClientResult<()> {
        let instrument = self.instrument(instrument_id)?;
        self.feed.publish(DataEvent::Instrument(instrument));
        Ok(())
    }

    pub async fn request_instruments(&self) -> ClientResult<()> {
        for instrument in self.feed.resolver().all() {
            self.feed.publish(DataEvent::Instrument(instrument));
        }
        Ok(())
    }

    pub async fn request_quotes(&self, _instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject("requesting historical quotes".to_string()))
    }

    pub async fn request_trades(&self, _instrument_id: &InstrumentId) -> ClientResult<()> {
        Err(self.reject("requesting historical trades".to_string()))
    }

    pub async fn request_bars(&self, _bar_type: &BarType) -> ClientResult<()> {
        Err(self.reject("requesting historical bars".to_string()))
    }

    pub fn handle_frame(&self, frame: &[u8]) {
        self.feed.handle_frame(frame);
    }

    fn reject(&self, operation: String) -> ClientError {
        warn!(%operation, "Rejected: not supported by Polymarket");
        ClientError::unsupported(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::mock::MockFactory;
    use crate::market_data::adapters::Transport;
    use crate::market_data::instruments::StaticInstrumentResolver;
    use crate::market_data::sink::RecordingSink;
    use std::time::Duration;
    use tokio::time::sleep;

    fn client() -> (PolymarketDataClient, Arc<RecordingSink>, Arc<MockFactory>) {
        let resolver = StaticInstrumentResolver::new([
            Instrument::new("0xm", "1", Some("Yes")),
            Instrument::new("0xm", "2", Some("No")),
        ]);
        let sink = Arc::new(RecordingSink::new());
        let factory = MockFactory::new();
        let config = DataClientConfig {
            price_precision: 2,
            size_precision: 0,
            ..DataClientConfig::default()
        };
        let client = PolymarketDataClient::new(config, Arc::new(resolver), sink.clone(), factory.clone());
        (client, sink, factory)
    }

    fn yes() -> InstrumentId {
        InstrumentId::from_venue("0xm", "1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_publishes_instruments() {
        let (client, sink, _) = client();
        client.connect().await;
        assert!(client.is_connected());
        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, DataEvent::Instrument(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_subscriptions_share_one_transport() {
        let (client, _, factory) = client();
        client.subscribe_book_deltas(&yes(), BookType::L2_MBP).await.unwrap();
        client.subscribe_quotes(&yes()).await.unwrap();
        client.subscribe_trades(&InstrumentId::from_venue("0xm", "2")).await.unwrap();
        sleep(Duration::from_secs(6)).await;

        let transports = factory.transports();
        assert_eq!(transports.len(), 1);
        assert_eq!(transports[0].tokens(), vec!["1", "2"]);
        assert!(transports[0].is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_flow_from_transport_to_sink() {
        let (client, sink, factory) = client();
        client.subscribe_quotes(&yes()).await.unwrap();
        sleep(Duration::from_secs(6)).await;

        factory.transports()[0].deliver(
            br#"{"event_type":"book","market":"0xm","asset_id":"1","timestamp":"1",
                "bids":[{"price":"0.45","size":"10"}],"asks":[{"price":"0.55","size":"20"}]}"#,
        );
        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], DataEvent::Quote(q) if q.bid_price == 45 && q.ask_size == 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_l3_and_unknown_instruments() {
        let (client, _, factory) = client();
        assert_eq!(
            client.subscribe_book_deltas(&yes(), BookType::L3_MBO).await,
            Err(ClientError::UnsupportedBookType(BookType::L3_MBO))
        );
        let unknown = InstrumentId::from_venue("0xm", "9");
        assert!(matches!(
            client.subscribe_trades(&unknown).await,
            Err(ClientError::UnknownInstrument(_))
        ));
        assert!(matches!(
            client.request_instrument(&unknown).await,
            Err(ClientError::UnknownInstrument(_))
        ));
        assert!(factory.transports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_rejected_and_subscription_stays() {
        let (client, _, _) = client();
        client.subscribe_quotes(&yes()).await.unwrap();

        let result = client.unsubscribe_quotes(&yes()).await;
        assert!(matches!(result, Err(ClientError::Unsupported { .. })));
        assert!(client.unsubscribe_book_deltas(&yes()).await.is_err());
        assert!(client.unsubscribe_book_snapshots(&yes()).await.is_err());
        assert!(client.unsubscribe_trades(&yes()).await.is_err());
        assert!(client.connections().is_subscribed(&yes()));
        assert!(client.feed().is_quote_subscribed(&yes()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_and_bars_rejected() {
        let (client, _, _) = client();
        let bar_type = BarType { instrument_id: yes(), spec: "1-MINUTE-LAST".into() };
        assert!(client.subscribe_bars(&bar_type).await.is_err());
        assert!(client.unsubscribe_bars(&bar_type).await.is_err());
        assert!(client.request_bars(&bar_type).await.is_err());
        assert!(client.request_quotes(&yes()).await.is_err());
        assert!(client.request_trades(&yes()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_instruments() {
        let (client, sink, _) = client();
        client.request_instrument(&yes()).await.unwrap();
        client.request_instruments().await.unwrap();
        assert_eq!(sink.take().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_tears_down_and_resets() {
        let (client, sink, factory) = client();
        client.connect().await;
        client.subscribe_quotes(&yes()).await.unwrap();
        sleep(Duration::from_secs(6)).await;
        client.handle_frame(
            br#"{"event_type":"book","market":"0xm","asset_id":"1","timestamp":"1","bids":[{"price":"0.45","size":"10"}],"asks":[]}"#,
        );
        sink.take();

        client.disconnect().await;
        assert!(!client.is_connected());
        assert!(!factory.transports()[0].is_connected());
        assert!(client.feed().shadow().is_empty());
        assert!(!client.connections().is_subscribed(&yes()));

        // A fresh subscription starts a new batch
        client.subscribe_trades(&yes()).await.unwrap();
        assert!(client.connections().pending_instruments().is_some());
    }
}
