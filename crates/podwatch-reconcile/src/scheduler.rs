//! Wiring of the loops, queues, and handlers into one running engine.

use std::sync::Arc;

use tracing::{info, warn};

use podwatch_dispatch::{
    COLLECT_CAMEL_STATUS, DELETE_CAMEL_STATUS, Handler, HandlerFuture, OrderedQueue,
    QueuePublisher, WorkerPool,
};
use podwatch_probe::RuntimeClient;
use podwatch_state::{CamelStatusRequest, DevModeStatus};

use crate::collector::StatusCollector;
use crate::error::ReconcileResult;
use crate::settings::ReconcileSettings;
use crate::ticker::{PeriodicTask, TickFn, TickFuture};

pub const DEVMODE_COLLECTION: &str = "devmode-collection";
pub const POD_COLLECTION: &str = "pod-collection";
pub const DEVMODE_CLEANUP: &str = "devmode-cleanup";

/// The running reconciliation engine: two queues and three loops.
pub struct Reconciler {
    collect: OrderedQueue<CamelStatusRequest>,
    delete: OrderedQueue<DevModeStatus>,
    loops: Vec<PeriodicTask>,
    pool: WorkerPool,
}

impl Reconciler {
    /// Spawn the queues and loops for `collector`.
    pub fn start<C: RuntimeClient>(
        collector: Arc<StatusCollector<C>>,
        settings: &ReconcileSettings,
    ) -> Self {
        let pool = WorkerPool::new(settings.workers);
        let collect = OrderedQueue::spawn(
            COLLECT_CAMEL_STATUS,
            settings.queue_capacity,
            pool.clone(),
            collect_handler(collector.clone()),
        );
        let delete = OrderedQueue::spawn(
            DELETE_CAMEL_STATUS,
            settings.queue_capacity,
            pool.clone(),
            delete_handler(collector.clone()),
        );

        let loops = vec![
            PeriodicTask::spawn(
                DEVMODE_COLLECTION,
                settings.devmode_status_interval,
                tick(collector.clone(), collect.publisher(), |c, p| {
                    Box::pin(async move { c.collect_devmode_statuses(&p).await })
                }),
            ),
            PeriodicTask::spawn(
                POD_COLLECTION,
                settings.camel_status_interval,
                tick(collector.clone(), collect.publisher(), |c, p| {
                    Box::pin(async move { c.collect_pod_statuses(&p).await })
                }),
            ),
            PeriodicTask::spawn(
                DEVMODE_CLEANUP,
                settings.devmode_status_interval,
                tick(collector, delete.publisher(), |c, p| {
                    Box::pin(async move { c.cleanup_devmode_statuses(&p).await })
                }),
            ),
        ];

        info!(
            environment = %settings.environment,
            workers = pool.size(),
            "reconciler started"
        );
        Self {
            collect,
            delete,
            loops,
            pool,
        }
    }

    pub fn collect_publisher(&self) -> QueuePublisher<CamelStatusRequest> {
        self.collect.publisher()
    }

    pub fn loops(&self) -> &[PeriodicTask] {
        &self.loops
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stop the loops, then drain both queues.
    pub async fn shutdown(self) {
        for task in self.loops {
            task.shutdown().await;
        }
        self.collect.shutdown().await;
        self.delete.shutdown().await;
        info!("reconciler stopped");
    }
}

type TickBody = std::pin::Pin<Box<dyn std::future::Future<Output = ReconcileResult<usize>> + Send>>;

/// Build a loop body that runs `body` against the collector and logs failures.
fn tick<C, T>(
    collector: Arc<StatusCollector<C>>,
    publisher: QueuePublisher<T>,
    body: fn(Arc<StatusCollector<C>>, QueuePublisher<T>) -> TickBody,
) -> TickFn
where
    C: RuntimeClient,
    T: Send + 'static,
{
    Arc::new(move || -> TickFuture {
        let run = body(collector.clone(), publisher.clone());
        Box::pin(async move {
            if let Err(e) = run.await {
                warn!(error = %e, "reconcile tick failed");
            }
        })
    })
}

fn collect_handler<C: RuntimeClient>(collector: Arc<StatusCollector<C>>) -> Handler<CamelStatusRequest> {
    Arc::new(move |request: CamelStatusRequest| -> HandlerFuture {
        let collector = collector.clone();
        Box::pin(async move {
            collector.handle_collect(request).await;
        })
    })
}

fn delete_handler<C: RuntimeClient>(collector: Arc<StatusCollector<C>>) -> Handler<DevModeStatus> {
    Arc::new(move |dms: DevModeStatus| -> HandlerFuture {
        let collector = collector.clone();
        Box::pin(async move {
            let project = dms.project_id.clone();
            if let Err(e) = collector.handle_delete(dms) {
                warn!(%project, error = %e, "devmode cleanup failed");
            }
        })
    })
}
