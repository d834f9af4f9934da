// In-memory transport for connection-manager and client tests
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{FrameHandler, Transport, TransportFactory};

pub struct MockTransport {
    pub handler: FrameHandler,
    tokens: Mutex<Vec<String>>,
    connected: AtomicBool,
    fail_connect: bool,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub connected_at: Mutex<Option<Instant>>,
}

impl MockTransport {
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    // Push a raw frame through the registered handler as if it came off the wire
    pub fn deliver(&self, frame: &[u8]) {
        (self.handler)(frame)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> anyhow::Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            anyhow::bail!("mock connect refused");
        }
        *self.connected_at.lock() = Some(Instant::now());
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self, token: &str) {
        let mut tokens = self.tokens.lock();
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub created: Mutex<Vec<Arc<MockTransport>>>,
    fail_connect: AtomicBool,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // Transports created from now on refuse to connect
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.created.lock().clone()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, handler: FrameHandler) -> Arc<dyn Transport> {
        let transport = Arc::new(MockTransport {
            handler,
            tokens: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            fail_connect: self.fail_connect.load(Ordering::SeqCst),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            connected_at: Mutex::new(None),
        });
        self.created.lock().push(Arc::clone(&transport));
        transport
    }
}
