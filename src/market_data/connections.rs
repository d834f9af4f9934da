//! Batches instrument subscriptions onto staggered transport connections.
//!
//! Subscriptions that arrive while a connection is scheduled but not yet
//! opened ride along on that connection. Once it opens, the next subscription
//! starts a new batch. The first connection waits the initial delay, later
//! ones the shorter inter-connection delay, so a burst of subscriptions never
//! turns into a burst of handshakes against the venue.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::types::InstrumentId;
use crate::market_data::adapters::{FrameHandler, Transport, TransportFactory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionDelays {
    pub initial: Duration,
    pub between: Duration,
}

impl ConnectionDelays {
    pub fn from_secs(initial: f64, between: f64) -> Self {
        Self {
            initial: Duration::from_secs_f64(initial.max(0.0)),
            between: Duration::from_secs_f64(between.max(0.0)),
        }
    }
}

struct PendingBatch {
    id: u64,
    transport: Arc<dyn Transport>,
    instruments: Vec<InstrumentId>,
    delay: Duration,
}

enum BatchState {
    Idle,
    ConnectScheduled(PendingBatch),
}

struct Inner {
    batch: BatchState,
    next_batch_id: u64,
    // Set once any batch has reached its connect attempt; picks the delay
    attempted: bool,
    connections: Vec<Arc<dyn Transport>>,
    tasks: Vec<JoinHandle<()>>,
    subscribed: AHashSet<InstrumentId>,
}

pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    handler: FrameHandler,
    delays: ConnectionDelays,
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn TransportFactory>, handler: FrameHandler, delays: ConnectionDelays) -> Self {
        Self {
            factory,
            handler,
            delays,
            inner: Arc::new(Mutex::new(Inner {
                batch: BatchState::Idle,
                next_batch_id: 0,
                attempted: false,
                connections: Vec::new(),
                tasks: Vec::new(),
                subscribed: AHashSet::new(),
            })),
        }
    }

    /// Adds `instrument` (venue token `token`) to the pending batch, scheduling
    /// a new connection if none is pending. Returns `false` if the instrument
    /// was already subscribed. Must be called from within a tokio runtime.
    pub fn subscribe(&self, instrument: &InstrumentId, token: &str) -> bool {
        let mut inner = self.inner.lock();
        if !inner.subscribed.insert(instrument.clone()) {
            debug!(%instrument, "Already subscribed");
            return false;
        }
        inner.tasks.retain(|t| !t.is_finished());

        if let BatchState::Idle = inner.batch {
            let delay = if !inner.attempted {
                self.delays.initial
            } else {
                self.delays.between
            };
            let id = inner.next_batch_id;
            inner.next_batch_id += 1;

            let transport = self.factory.create(Arc::clone(&self.handler));
            inner.batch = BatchState::ConnectScheduled(PendingBatch {
                id,
                transport,
                instruments: Vec::new(),
                delay,
            });
            debug!(batch = id, ?delay, "Scheduled delayed connection");
            let task = tokio::spawn(delayed_connect(Arc::clone(&self.inner), id, delay));
            inner.tasks.push(task);
        }

        if let BatchState::ConnectScheduled(batch) = &mut inner.batch {
            batch.transport.subscribe(token);
            batch.instruments.push(instrument.clone());
        }
        true
    }

    pub fn is_subscribed(&self, instrument: &InstrumentId) -> bool {
        self.inner.lock().subscribed.contains(instrument)
    }

    // Instruments waiting on a not-yet-opened connection
    pub fn pending_instruments(&self) -> Option<Vec<InstrumentId>> {
        match &self.inner.lock().batch {
            BatchState::Idle => None,
            BatchState::ConnectScheduled(batch) => Some(batch.instruments.clone()),
        }
    }

    pub fn pending_delay(&self) -> Option<Duration> {
        match &self.inner.lock().batch {
            BatchState::Idle => None,
            BatchState::ConnectScheduled(batch) => Some(batch.delay),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Cancels any scheduled connect and closes every open connection
    /// concurrently, returning once all of them are closed.
    pub async fn shutdown(&self) {
        let (tasks, connections) = {
            let mut inner = self.inner.lock();
            inner.batch = BatchState::Idle;
            inner.attempted = false;
            inner.subscribed.clear();
            (mem::take(&mut inner.tasks), mem::take(&mut inner.connections))
        };

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Connection task ended abnormally");
                }
            }
        }

        let closing: Vec<_> = connections
            .iter()
            .filter(|c| c.is_connected())
            .map(|c| c.disconnect())
            .collect();
        let count = closing.len();
        for result in join_all(closing).await {
            if let Err(e) = result {
                error!(error = %e, "Failed to close connection");
            }
        }
        info!(closed = count, "All connections closed");
    }
}

async fn delayed_connect(inner: Arc<Mutex<Inner>>, batch_id: u64, delay: Duration) {
    tokio::time::sleep(delay).await;

    // Taking the batch clears the pending marker whether connect succeeds or not
    let batch = {
        let mut guard = inner.lock();
        match mem::replace(&mut guard.batch, BatchState::Idle) {
            BatchState::ConnectScheduled(batch) if batch.id == batch_id => {
                guard.attempted = true;
                guard.connections.push(Arc::clone(&batch.transport));
                batch
            }
            other => {
                guard.batch = other;
                return;
            }
        }
    };

    info!(batch = batch_id, instruments = batch.instruments.len(), "Opening connection");
    match batch.transport.connect().await {
        Ok(()) => {
            metrics::counter!("pmfeed_connections_opened_total").increment(1);
            info!(batch = batch_id, "Connection established");
        }
        Err(e) => {
            metrics::counter!("pmfeed_connections_failed_total").increment(1);
            error!(batch = batch_id, error = %e, "Failed to open connection");
            // Release the transport and let its instruments start a fresh batch
            let mut guard = inner.lock();
            guard.connections.retain(|c| !Arc::ptr_eq(c, &batch.transport));
            for instrument in &batch.instruments {
                guard.subscribed.remove(instrument);
            }
        }
    }
}
