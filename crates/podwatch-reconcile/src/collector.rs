//! Status collection and devmode cleanup.
//!
//! The three `collect_*`/`cleanup_*` methods are loop ticks: they enumerate
//! targets from the store and publish one work item per target. The two
//! `handle_*` methods are the queue handlers that do the actual probing and
//! deleting. Ticks are no-ops until the store reports ready.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use podwatch_dispatch::QueuePublisher;
use podwatch_probe::RuntimeClient;
use podwatch_state::*;

use crate::error::ReconcileResult;
use crate::settings::ReconcileSettings;

/// A container's `context` status changed between two collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChange {
    pub container_name: String,
    /// Previous payload, absent on the first successful probe.
    pub old_context: Option<String>,
    pub new_context: String,
}

/// Callback invoked with every observed context change.
pub type ContextCallback = Arc<dyn Fn(ContextChange) -> ContextFuture + Send + Sync>;

pub type ContextFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct StatusCollector<C> {
    store: Arc<dyn StatusStore>,
    client: Arc<C>,
    environment: String,
    probe_timeout: Duration,
    on_context_change: Option<ContextCallback>,
}

impl<C: RuntimeClient> StatusCollector<C> {
    pub fn new(store: Arc<dyn StatusStore>, client: Arc<C>, settings: &ReconcileSettings) -> Self {
        Self {
            store,
            client,
            environment: settings.environment.clone(),
            probe_timeout: settings.probe_timeout,
            on_context_change: None,
        }
    }

    /// Set a callback for context status changes.
    pub fn with_context_callback(mut self, callback: ContextCallback) -> Self {
        self.on_context_change = Some(callback);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Devmode collection tick: one request per registered devmode session.
    pub async fn collect_devmode_statuses(
        &self,
        collect: &QueuePublisher<CamelStatusRequest>,
    ) -> ReconcileResult<usize> {
        if !self.store.is_ready() {
            return Ok(0);
        }
        let sessions = self.store.list_devmode_statuses()?;
        for dms in &sessions {
            collect.publish(CamelStatusRequest::from(dms)).await?;
        }
        debug!(published = sessions.len(), "devmode collection tick");
        Ok(sessions.len())
    }

    /// Production collection tick: one request per pod in this environment.
    pub async fn collect_pod_statuses(
        &self,
        collect: &QueuePublisher<CamelStatusRequest>,
    ) -> ReconcileResult<usize> {
        if !self.store.is_ready() {
            return Ok(0);
        }
        let pods = self.store.list_pod_statuses(&self.environment)?;
        for pod in &pods {
            collect.publish(CamelStatusRequest::from(pod)).await?;
        }
        debug!(published = pods.len(), environment = %self.environment, "pod collection tick");
        Ok(pods.len())
    }

    /// Devmode cleanup tick: publish every session whose pod is gone.
    ///
    /// A failed pod lookup skips that session until the next tick.
    pub async fn cleanup_devmode_statuses(
        &self,
        delete: &QueuePublisher<DevModeStatus>,
    ) -> ReconcileResult<usize> {
        if !self.store.is_ready() {
            return Ok(0);
        }
        let mut orphaned = 0;
        for dms in self.store.list_devmode_statuses()? {
            let pod = match self
                .store
                .get_devmode_pod_status(&dms.project_id, &self.environment)
            {
                Ok(pod) => pod,
                Err(e) => {
                    warn!(project = %dms.project_id, error = %e, "devmode pod lookup failed");
                    continue;
                }
            };
            if pod.is_none() {
                debug!(project = %dms.project_id, container = %dms.container_name, "devmode pod gone");
                delete.publish(dms).await?;
                orphaned += 1;
            }
        }
        Ok(orphaned)
    }

    /// Probe every status name of one container; returns the rows written.
    ///
    /// A failed probe leaves the previous row for that name untouched. A
    /// store error is logged and only skips that status name.
    pub async fn handle_collect(&self, request: CamelStatusRequest) -> usize {
        let mut saved = 0;
        for name in CamelStatusName::ALL {
            let Some(status) = self
                .client
                .probe_status(&request.container_name, name, self.probe_timeout)
                .await
            else {
                continue;
            };

            let previous = match (name, &self.on_context_change) {
                (CamelStatusName::Context, Some(_)) => match self.store.get_camel_status(
                    &request.project_id,
                    name,
                    &self.environment,
                ) {
                    Ok(row) => row.map(|row| row.status),
                    Err(e) => {
                        warn!(container = %request.container_name, status = %name, error = %e, "status read failed");
                        continue;
                    }
                },
                _ => None,
            };

            let row = CamelStatus {
                project_id: request.project_id.clone(),
                container_name: request.container_name.clone(),
                name,
                status,
                environment: self.environment.clone(),
            };
            if let Err(e) = self.store.save_camel_status(&row) {
                warn!(container = %request.container_name, status = %name, error = %e, "status write failed");
                continue;
            }
            saved += 1;

            if let (CamelStatusName::Context, Some(callback)) = (name, &self.on_context_change) {
                if previous.as_deref() != Some(row.status.as_str()) {
                    callback(ContextChange {
                        container_name: row.container_name,
                        old_context: previous,
                        new_context: row.status,
                    })
                    .await;
                }
            }
        }
        debug!(container = %request.container_name, saved, "statuses collected");
        saved
    }

    /// Remove every status row of a vanished devmode session, then the session.
    ///
    /// If any status row could not be removed the session is kept, so the
    /// next cleanup tick publishes it again.
    pub fn handle_delete(&self, dms: DevModeStatus) -> ReconcileResult<usize> {
        let mut removed = 0;
        let mut failed = 0;
        for name in CamelStatusName::ALL {
            match self
                .store
                .delete_camel_status(&dms.project_id, name, &self.environment)
            {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(project = %dms.project_id, status = %name, error = %e, "status delete failed");
                }
            }
        }
        if failed > 0 {
            warn!(project = %dms.project_id, failed, "devmode session kept for retry");
            return Ok(removed);
        }
        self.store.delete_devmode_status(&dms.project_id)?;
        info!(project = %dms.project_id, container = %dms.container_name, removed, "devmode session cleaned up");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{Call, FakeRuntime, FlakyStore, capture_queue, ready_store};

    fn collector(store: Arc<dyn StatusStore>, client: Arc<FakeRuntime>) -> StatusCollector<FakeRuntime> {
        StatusCollector::new(store, client, &ReconcileSettings::default())
    }

    fn devmode(project: &str) -> DevModeStatus {
        DevModeStatus {
            project_id: project.to_string(),
            container_name: podwatch_core::devmode_container_name(project),
        }
    }

    fn pod(project: &str, name: &str, environment: &str) -> PodStatus {
        PodStatus {
            project_id: project.to_string(),
            name: name.to_string(),
            environment: environment.to_string(),
        }
    }

    fn request(project: &str, container: &str) -> CamelStatusRequest {
        CamelStatusRequest {
            project_id: project.to_string(),
            container_name: container.to_string(),
        }
    }

    #[tokio::test]
    async fn collect_saves_every_successful_probe() {
        let (store, port) = ready_store();
        let client = Arc::new(FakeRuntime::healthy());
        let collector = collector(port, client.clone());

        let saved = collector
            .handle_collect(request("orderproj", "orderproj-devmode"))
            .await;

        assert_eq!(saved, CamelStatusName::ALL.len());
        assert_eq!(client.calls().len(), CamelStatusName::ALL.len());
        assert_eq!(
            client.calls()[0],
            Call::Probe("orderproj-devmode".to_string(), CamelStatusName::Context)
        );

        let route = store
            .get_camel_status("orderproj", CamelStatusName::Route, "dev")
            .unwrap()
            .unwrap();
        assert_eq!(route.container_name, "orderproj-devmode");
        assert_eq!(route.status, "{\"route\": \"ok\"}");
    }

    #[tokio::test]
    async fn failed_probe_keeps_previous_row() {
        let (store, port) = ready_store();
        store
            .save_camel_status(&CamelStatus {
                project_id: "orderproj".to_string(),
                container_name: "orderproj-devmode".to_string(),
                name: CamelStatusName::Health,
                status: "{\"status\": \"UP\"}".to_string(),
                environment: "dev".to_string(),
            })
            .unwrap();

        // Health answers 503, which the client reports as absent.
        let client = Arc::new(FakeRuntime::healthy());
        client.set_status(CamelStatusName::Health, None);
        let collector = collector(port, client);

        let saved = collector
            .handle_collect(request("orderproj", "orderproj-devmode"))
            .await;
        assert_eq!(saved, CamelStatusName::ALL.len() - 1);

        let health = store
            .get_camel_status("orderproj", CamelStatusName::Health, "dev")
            .unwrap()
            .unwrap();
        assert_eq!(health.status, "{\"status\": \"UP\"}");
    }

    #[tokio::test]
    async fn failed_probe_writes_no_row() {
        let (store, port) = ready_store();
        let client = Arc::new(FakeRuntime::new());
        client.set_status(CamelStatusName::Context, Some("{}"));
        let collector = collector(port, client);

        collector.handle_collect(request("p1", "p1-7c9f")).await;

        assert!(
            store
                .get_camel_status("p1", CamelStatusName::Health, "dev")
                .unwrap()
                .is_none()
        );
        assert_eq!(store.list_camel_statuses("p1", "dev").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ticks_are_noops_until_store_ready() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_devmode_status(&devmode("p1")).unwrap();
        let port: Arc<dyn StatusStore> = Arc::new(store.clone());
        let collector = collector(port, Arc::new(FakeRuntime::new()));
        let (collect, seen) = capture_queue::<CamelStatusRequest>("collect");
        let (delete, deleted) = capture_queue::<DevModeStatus>("delete");

        assert_eq!(collector.collect_devmode_statuses(&collect.publisher()).await.unwrap(), 0);
        assert_eq!(collector.cleanup_devmode_statuses(&delete.publisher()).await.unwrap(), 0);

        store.start();
        assert_eq!(collector.collect_devmode_statuses(&collect.publisher()).await.unwrap(), 1);

        collect.shutdown().await;
        delete.shutdown().await;
        assert_eq!(*seen.lock().unwrap(), vec![request("p1", "p1-devmode")]);
        assert!(deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pod_collection_only_covers_current_environment() {
        let (store, port) = ready_store();
        store.put_pod_status(&pod("orders", "orders-5d8f", "dev")).unwrap();
        store.put_pod_status(&pod("orders", "orders-9b2c", "prod")).unwrap();
        let collector = collector(port, Arc::new(FakeRuntime::new()));
        let (collect, seen) = capture_queue::<CamelStatusRequest>("collect");

        let published = collector.collect_pod_statuses(&collect.publisher()).await.unwrap();
        collect.shutdown().await;

        assert_eq!(published, 1);
        assert_eq!(*seen.lock().unwrap(), vec![request("orders", "orders-5d8f")]);
    }

    #[tokio::test]
    async fn cleanup_removes_orphaned_session_and_its_statuses() {
        let (store, port) = ready_store();
        store.put_devmode_status(&devmode("p1")).unwrap();
        store.put_devmode_status(&devmode("p2")).unwrap();
        store.put_pod_status(&pod("p2", "p2-devmode", "dev")).unwrap();

        let client = Arc::new(FakeRuntime::healthy());
        let collector = collector(port, client);
        collector.handle_collect(request("p1", "p1-devmode")).await;
        collector.handle_collect(request("p2", "p2-devmode")).await;

        let (delete, published) = capture_queue::<DevModeStatus>("delete");
        let orphaned = collector.cleanup_devmode_statuses(&delete.publisher()).await.unwrap();
        delete.shutdown().await;
        assert_eq!(orphaned, 1);

        let published = published.lock().unwrap().clone();
        assert_eq!(published, vec![devmode("p1")]);
        for dms in published {
            assert_eq!(collector.handle_delete(dms).unwrap(), CamelStatusName::ALL.len());
        }

        assert!(store.get_devmode_status("p1").unwrap().is_none());
        assert!(store.list_camel_statuses("p1", "dev").unwrap().is_empty());
        assert!(store.get_devmode_status("p2").unwrap().is_some());
        assert_eq!(
            store.list_camel_statuses("p2", "dev").unwrap().len(),
            CamelStatusName::ALL.len()
        );
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (store, port) = ready_store();
        store.put_devmode_status(&devmode("p1")).unwrap();
        let collector = collector(port, Arc::new(FakeRuntime::new()));

        for expected in [1, 0] {
            let (delete, published) = capture_queue::<DevModeStatus>("delete");
            let orphaned = collector.cleanup_devmode_statuses(&delete.publisher()).await.unwrap();
            delete.shutdown().await;
            assert_eq!(orphaned, expected);
            for dms in published.lock().unwrap().drain(..) {
                collector.handle_delete(dms).unwrap();
            }
        }

        assert!(store.list_devmode_statuses().unwrap().is_empty());
        // Deleting an already-cleaned session is harmless.
        assert_eq!(collector.handle_delete(devmode("p1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn context_callback_fires_on_change_only() {
        let (_store, port) = ready_store();
        let client = Arc::new(FakeRuntime::new());
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let callback: ContextCallback = Arc::new(move |change: ContextChange| -> ContextFuture {
            sink.lock().unwrap().push(change);
            Box::pin(async {})
        });
        let collector = collector(port, client.clone()).with_context_callback(callback);
        let req = request("orderproj", "orderproj-devmode");

        client.set_status(CamelStatusName::Context, Some("{\"context\": {\"state\": \"Starting\"}}"));
        collector.handle_collect(req.clone()).await;
        collector.handle_collect(req.clone()).await;
        client.set_status(CamelStatusName::Context, Some("{\"context\": {\"state\": \"Started\"}}"));
        collector.handle_collect(req).await;

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].old_context, None);
        assert_eq!(
            changes[1].old_context.as_deref(),
            Some("{\"context\": {\"state\": \"Starting\"}}")
        );
        assert_eq!(changes[1].container_name, "orderproj-devmode");
    }

    #[tokio::test]
    async fn write_error_skips_only_that_status() {
        let (store, _) = ready_store();
        let mut flaky = FlakyStore::new(store.clone());
        flaky.fail_save = Some(CamelStatusName::Health);
        let client = Arc::new(FakeRuntime::healthy());
        let collector = collector(Arc::new(flaky), client.clone());

        let saved = collector.handle_collect(request("orders", "orders-5d8f")).await;

        assert_eq!(saved, CamelStatusName::ALL.len() - 1);
        assert_eq!(client.calls().len(), CamelStatusName::ALL.len());
        assert!(
            store
                .get_camel_status("orders", CamelStatusName::Health, "dev")
                .unwrap()
                .is_none()
        );
        for name in [CamelStatusName::Endpoints, CamelStatusName::Jvm] {
            assert!(store.get_camel_status("orders", name, "dev").unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn failed_pod_lookup_skips_only_that_session() {
        let (store, _) = ready_store();
        store.put_devmode_status(&devmode("p1")).unwrap();
        store.put_devmode_status(&devmode("p2")).unwrap();
        let mut flaky = FlakyStore::new(store.clone());
        flaky.fail_pod_lookup = Some("p1".to_string());
        let collector = collector(Arc::new(flaky), Arc::new(FakeRuntime::new()));

        let (delete, published) = capture_queue::<DevModeStatus>("delete");
        let orphaned = collector.cleanup_devmode_statuses(&delete.publisher()).await.unwrap();
        delete.shutdown().await;

        assert_eq!(orphaned, 1);
        assert_eq!(*published.lock().unwrap(), vec![devmode("p2")]);
    }

    #[tokio::test]
    async fn failed_status_delete_keeps_session_for_retry() {
        let (store, _) = ready_store();
        store.put_devmode_status(&devmode("p1")).unwrap();
        let mut flaky = FlakyStore::new(store.clone());
        flaky.fail_delete = Some(CamelStatusName::Route);
        let collector = collector(Arc::new(flaky), Arc::new(FakeRuntime::healthy()));
        collector.handle_collect(request("p1", "p1-devmode")).await;

        let removed = collector.handle_delete(devmode("p1")).unwrap();

        assert_eq!(removed, CamelStatusName::ALL.len() - 1);
        assert!(store.get_devmode_status("p1").unwrap().is_some());
        assert_eq!(store.list_camel_statuses("p1", "dev").unwrap().len(), 1);
    }
}
