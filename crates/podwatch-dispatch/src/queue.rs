//! Ordered dispatch queue — one consumer task per address.
//!
//! Items are delivered to the handler in publish order and the next item is
//! not taken until the current handler call has completed. Each handler call
//! runs as its own task holding a worker-pool permit, so a panicking
//! handler is logged without killing the queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, DispatchResult};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handler invoked once per work item.
pub type Handler<T> = Arc<dyn Fn(T) -> HandlerFuture + Send + Sync>;

/// Bounded pool of handler slots shared by every queue.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running handler.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Cloneable sending side of an [`OrderedQueue`].
pub struct QueuePublisher<T> {
    address: Arc<str>,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueuePublisher<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> QueuePublisher<T> {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Enqueue an item, waiting for capacity if the queue is full.
    pub async fn publish(&self, item: T) -> DispatchResult<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| DispatchError::Closed(self.address.to_string()))
    }
}

/// A named queue with a single consumer feeding one handler.
pub struct OrderedQueue<T> {
    publisher: QueuePublisher<T>,
    processed: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    consumer: JoinHandle<()>,
}

impl<T: Send + 'static> OrderedQueue<T> {
    /// Start the consumer for `address` and return the queue.
    pub fn spawn(
        address: &str,
        capacity: usize,
        pool: WorkerPool,
        handler: Handler<T>,
    ) -> Self {
        let address: Arc<str> = Arc::from(address);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processed = Arc::new(AtomicU64::new(0));

        let consumer = tokio::spawn(run_consumer(
            address.clone(),
            rx,
            pool,
            handler,
            processed.clone(),
            shutdown_rx,
        ));

        info!(%address, capacity, "dispatch queue started");
        Self {
            publisher: QueuePublisher { address, tx },
            processed,
            shutdown_tx,
            consumer,
        }
    }

    pub fn address(&self) -> &str {
        self.publisher.address()
    }

    pub fn publisher(&self) -> QueuePublisher<T> {
        self.publisher.clone()
    }

    /// Enqueue an item, waiting for capacity if the queue is full.
    pub async fn publish(&self, item: T) -> DispatchResult<()> {
        self.publisher.publish(item).await
    }

    /// Number of items whose handler call has completed (or panicked).
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Stop accepting items, finish everything already queued, then stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.consumer.await {
            error!(address = %self.publisher.address, error = %e, "dispatch consumer failed");
        }
    }
}

async fn run_consumer<T: Send + 'static>(
    address: Arc<str>,
    mut rx: mpsc::Receiver<T>,
    pool: WorkerPool,
    handler: Handler<T>,
    processed: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            item = rx.recv() => match item {
                Some(item) => handle_one(&address, &pool, &handler, item, &processed).await,
                None => break,
            },
            _ = shutdown.changed() => {
                // Refuse new items but drain what was accepted.
                rx.close();
                let mut drained = 0u64;
                while let Some(item) = rx.recv().await {
                    handle_one(&address, &pool, &handler, item, &processed).await;
                    drained += 1;
                }
                debug!(%address, drained, "dispatch queue drained");
                break;
            }
        }
    }
    info!(%address, "dispatch queue stopped");
}

async fn handle_one<T: Send + 'static>(
    address: &str,
    pool: &WorkerPool,
    handler: &Handler<T>,
    item: T,
    processed: &AtomicU64,
) {
    let permit = match pool.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            warn!(%address, "worker pool closed, dropping item");
            return;
        }
    };

    let fut = handler(item);
    let task = tokio::spawn(async move {
        let _permit = permit;
        fut.await;
    });

    if let Err(e) = task.await {
        if e.is_panic() {
            error!(%address, "dispatch handler panicked");
        } else {
            warn!(%address, error = %e, "dispatch handler cancelled");
        }
    }
    processed.fetch_add(1, Ordering::SeqCst);
}
