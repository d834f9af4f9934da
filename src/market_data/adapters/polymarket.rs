// Polymarket market-channel WebSocket transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::{FrameHandler, Transport, TransportFactory};

struct Session {
    shutdown_tx: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

pub struct PolymarketWsTransport {
    url: String,
    ping_interval: Duration,
    handler: FrameHandler,
    tokens: Mutex<Vec<String>>,
    session: Mutex<Option<Session>>,
    connected: Arc<AtomicBool>,
}

impl PolymarketWsTransport {
    pub fn new(url: &str, ping_interval: Duration, handler: FrameHandler) -> Self {
        Self {
            url: url.to_string(),
            ping_interval,
            handler,
            tokens: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "type": "market",
            "assets_ids": self.tokens(),
        })
        .to_string()
    }
}

#[async_trait::async_trait]
impl Transport for PolymarketWsTransport {
    async fn connect(&self) -> anyhow::Result<()> {
        let subscribe_msg = self.subscribe_message();
        info!(url = %self.url, tokens = self.tokens.lock().len(), "Connecting to Polymarket WebSocket");

        let (ws_stream, response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .with_context(|| format!("failed to connect to {}", self.url))?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (mut write, mut read) = ws_stream.split();
        write
            .send(Message::Text(subscribe_msg))
            .await
            .context("failed to send market subscription")?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let handler = Arc::clone(&self.handler);
        let connected = Arc::clone(&self.connected);
        let ping_interval = self.ping_interval;

        let reader = tokio::spawn(async move {
            let mut ping = tokio::time::interval(ping_interval);
            ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ping.reset(); // first tick would fire immediately

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    _ = ping.tick() => {
                        if let Err(e) = write.send(Message::Text("PING".to_string())).await {
                            warn!(error = %e, "Failed to send keep-alive");
                            break;
                        }
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => handler(text.as_bytes()),
                        Some(Ok(Message::Binary(data))) => handler(&data),
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "WebSocket connection closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "Error reading from WebSocket");
                            break;
                        }
                        None => {
                            info!("WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
            connected.store(false, Ordering::Release);
        });

        *self.session.lock() = Some(Session { shutdown_tx, reader });
        self.connected.store(true, Ordering::Release);
        info!(url = %self.url, "Polymarket WebSocket connected");
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return Ok(());
        };
        // Reader may already be gone if the server closed first
        let _ = session.shutdown_tx.send(());
        session.reader.await.context("WebSocket reader task failed")?;
        self.connected.store(false, Ordering::Release);
        info!(url = %self.url, "Polymarket WebSocket disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn subscribe(&self, token: &str) {
        let mut tokens = self.tokens.lock();
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
}

pub struct PolymarketTransportFactory {
    url: String,
    ping_interval: Duration,
}

impl PolymarketTransportFactory {
    pub fn new(url: &str, ping_interval: Duration) -> Self {
        Self { url: url.to_string(), ping_interval }
    }
}

impl TransportFactory for PolymarketTransportFactory {
    fn create(&self, handler: FrameHandler) -> Arc<dyn Transport> {
        info!("Creating new Polymarket WebSocket transport");
        Arc::new(PolymarketWsTransport::new(&self.url, self.ping_interval, handler))
    }
}
