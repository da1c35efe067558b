//! Reload orchestration for devmode containers.
//!
//! `reload_project_code` pushes every file of a project into its
//! `<project>-devmode` container and triggers one reload. The devmode
//! session row is dropped afterwards whatever happened; the component that
//! owns the container lifecycle registers it again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use podwatch_core::{devmode_container_name, project_from_devmode_container};
use podwatch_probe::RuntimeClient;
use podwatch_state::StatusStore;

use crate::collector::{ContextCallback, ContextChange, ContextFuture};
use crate::error::{ReconcileError, ReconcileResult};
use crate::settings::ReconcileSettings;

/// Context state that makes a reload worthwhile.
const STARTED: &str = "Started";

/// What a single reload pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub container_name: String,
    pub uploaded: usize,
    pub failed: usize,
    /// Body returned by the reload endpoint, if it answered 200.
    pub reload: Option<String>,
}

pub struct ReloadOrchestrator<C> {
    store: Arc<dyn StatusStore>,
    client: Arc<C>,
    upload_timeout: Duration,
    reload_timeout: Duration,
    /// Projects with a reload pass running.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Holds a project's slot in `in_flight` until dropped.
struct InFlight {
    projects: Arc<Mutex<HashSet<String>>>,
    project_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.projects).remove(&self.project_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<C: RuntimeClient> ReloadOrchestrator<C> {
    pub fn new(store: Arc<dyn StatusStore>, client: Arc<C>, settings: &ReconcileSettings) -> Self {
        Self {
            store,
            client,
            upload_timeout: settings.upload_timeout,
            reload_timeout: settings.reload_timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, project_id: &str) -> ReconcileResult<InFlight> {
        if !lock(&self.in_flight).insert(project_id.to_string()) {
            return Err(ReconcileError::ReloadInProgress(project_id.to_string()));
        }
        Ok(InFlight {
            projects: self.in_flight.clone(),
            project_id: project_id.to_string(),
        })
    }

    /// Upload all project files to the devmode container, then reload it.
    ///
    /// Upload failures are logged per file and never stop the pass. At most
    /// one pass runs per project; a second concurrent request is rejected
    /// with `ReloadInProgress`. Otherwise only a failure to drop the devmode
    /// session is returned as an error.
    pub async fn reload_project_code(&self, project_id: &str) -> ReconcileResult<ReloadOutcome> {
        let _slot = self.claim(project_id)?;
        let container_name = devmode_container_name(project_id);
        info!(project = %project_id, container = %container_name, "reloading project code");

        let files = match self.store.get_project_files(project_id) {
            Ok(files) => files,
            Err(e) => {
                warn!(project = %project_id, error = %e, "failed to read project files");
                Vec::new()
            }
        };

        let mut outcome = ReloadOutcome {
            container_name,
            uploaded: 0,
            failed: 0,
            reload: None,
        };
        for file in &files {
            let ok = self
                .client
                .upload_file(&outcome.container_name, &file.name, &file.code, self.upload_timeout)
                .await;
            if ok {
                outcome.uploaded += 1;
            } else {
                outcome.failed += 1;
                warn!(container = %outcome.container_name, file = %file.name, "file upload failed");
            }
        }

        outcome.reload = self
            .client
            .trigger_reload(&outcome.container_name, self.reload_timeout)
            .await;
        if outcome.reload.is_none() {
            warn!(container = %outcome.container_name, "reload request failed");
        }

        self.store.delete_devmode_status(project_id)?;
        info!(
            project = %project_id,
            uploaded = outcome.uploaded,
            failed = outcome.failed,
            reloaded = outcome.reload.is_some(),
            "project code reload finished"
        );
        Ok(outcome)
    }

    /// React to a new `context` payload from a container.
    ///
    /// Reloads the owning project when [`should_reload`] holds. Containers
    /// that are not devmode containers are ignored.
    pub async fn on_context_change(
        &self,
        container_name: &str,
        old_context: Option<&str>,
        new_context: Option<&str>,
    ) -> ReconcileResult<Option<ReloadOutcome>> {
        if !should_reload(old_context, new_context) {
            return Ok(None);
        }
        let Some(project_id) = project_from_devmode_container(container_name) else {
            debug!(container = %container_name, "context change on non-devmode container ignored");
            return Ok(None);
        };
        self.reload_project_code(project_id).await.map(Some)
    }
}

/// Context-triggered reloads running on their own tasks.
///
/// Tasks are tracked so shutdown can wait for passes already under way.
pub struct BackgroundReloads<C> {
    orchestrator: Arc<ReloadOrchestrator<C>>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl<C: RuntimeClient> BackgroundReloads<C> {
    pub fn new(orchestrator: Arc<ReloadOrchestrator<C>>) -> Self {
        Self {
            orchestrator,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Collector callback that runs [`ReloadOrchestrator::on_context_change`]
    /// in the background. The collect handler does not wait for it.
    pub fn context_callback(&self) -> ContextCallback {
        let orchestrator = self.orchestrator.clone();
        let tasks = self.tasks.clone();
        Arc::new(move |change: ContextChange| -> ContextFuture {
            let orchestrator = orchestrator.clone();
            let mut tasks = lock(&tasks);
            while let Some(done) = tasks.try_join_next() {
                report_reload_task(done);
            }
            tasks.spawn(async move {
                let result = orchestrator
                    .on_context_change(
                        &change.container_name,
                        change.old_context.as_deref(),
                        Some(change.new_context.as_str()),
                    )
                    .await;
                match result {
                    Ok(_) => {}
                    Err(ReconcileError::ReloadInProgress(project)) => {
                        debug!(%project, "reload already running, change skipped");
                    }
                    Err(e) => {
                        warn!(container = %change.container_name, error = %e, "context-triggered reload failed");
                    }
                }
            });
            Box::pin(async {})
        })
    }

    /// Reload tasks not yet reaped.
    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Wait for every reload already started.
    pub async fn shutdown(&self) {
        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        while let Some(done) = tasks.join_next().await {
            report_reload_task(done);
        }
        debug!("background reloads drained");
    }
}

fn report_reload_task(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "reload task failed");
    }
}

/// `context.state` of a raw context payload.
///
/// An absent or malformed payload, or one without a string state, has no state.
pub fn context_state(raw: Option<&str>) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw?).ok()?;
    value
        .get("context")?
        .get("state")?
        .as_str()
        .map(str::to_string)
}

/// Reload only when a new context exists, its state moved, and it is now "Started".
pub fn should_reload(old_context: Option<&str>, new_context: Option<&str>) -> bool {
    if new_context.is_none() {
        return false;
    }
    let new_state = context_state(new_context);
    new_state != context_state(old_context) && new_state.as_deref() == Some(STARTED)
}
