// Router wires resolver + transports + client and drains normalized events
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::engine::types::{BookType, DataEvent};
use crate::market_data::adapters::polymarket::PolymarketTransportFactory;
use crate::market_data::client::PolymarketDataClient;
use crate::market_data::instruments::StaticInstrumentResolver;

pub async fn run(config: AppConfig) -> Result<()> {
    let instruments = config.instruments();
    if instruments.is_empty() {
        warn!("No instruments configured, nothing to subscribe");
    }

    let resolver = Arc::new(StaticInstrumentResolver::new(instruments.clone()));
    let (tx, rx) = mpsc::unbounded_channel::<DataEvent>();
    let factory = Arc::new(PolymarketTransportFactory::new(
        &config.client.base_url_ws,
        Duration::from_secs(config.client.ping_interval_secs),
    ));
    let client = PolymarketDataClient::new(config.client.clone(), resolver, Arc::new(tx), factory);

    let printer = tokio::spawn(log_events(rx));

    client.connect().await;
    for instrument in &instruments {
        client.subscribe_book_deltas(&instrument.id, BookType::L2_MBP).await?;
        client.subscribe_quotes(&instrument.id).await?;
        client.subscribe_trades(&instrument.id).await?;
    }
    info!(count = instruments.len(), "Subscribed, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    client.disconnect().await;

    printer.abort();
    Ok(())
}

async fn log_events(mut rx: mpsc::UnboundedReceiver<DataEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DataEvent::Deltas(d) => {
                debug!(instrument = %d.instrument_id, deltas = d.len(), snapshot = d.is_snapshot, ts_ms = d.ts_ms, "Deltas")
            }
            DataEvent::Quote(q) => info!(
                instrument = %q.instrument_id,
                bid = q.bid_price,
                bid_size = q.bid_size,
                ask = q.ask_price,
                ask_size = q.ask_size,
                "Quote"
            ),
            DataEvent::Trade(t) => info!(
                instrument = %t.instrument_id,
                price = t.price,
                size = t.size,
                aggressor = ?t.aggressor,
                "Trade"
            ),
            DataEvent::Instrument(i) => {
                info!(instrument = %i.id, outcome = ?i.outcome, "Instrument")
            }
        }
    }
}
