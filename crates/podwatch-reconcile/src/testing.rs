//! Test doubles shared by the handler and scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use podwatch_dispatch::{Handler, HandlerFuture, OrderedQueue, WorkerPool};
use podwatch_probe::RuntimeClient;
use podwatch_state::{
    CamelStatus, CamelStatusName, DevModeStatus, Environment, PodStatus, Project, ProjectFile,
    StateError, StateResult, StateStore, StatusStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(String, CamelStatusName),
    Upload(String, String),
    Reload(String),
}

/// In-process runtime: answers from a table and records every call.
#[derive(Default)]
pub struct FakeRuntime {
    calls: Mutex<Vec<Call>>,
    statuses: Mutex<HashMap<CamelStatusName, String>>,
    failing_uploads: AtomicBool,
    upload_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every status name with a small JSON body.
    pub fn healthy() -> Self {
        let fake = Self::new();
        for name in CamelStatusName::ALL {
            fake.set_status(name, Some(&format!("{{\"{name}\": \"ok\"}}")));
        }
        fake
    }

    /// `None` makes the probe for `name` fail.
    pub fn set_status(&self, name: CamelStatusName, body: Option<&str>) {
        let mut statuses = self.statuses.lock().unwrap();
        match body {
            Some(body) => statuses.insert(name, body.to_string()),
            None => statuses.remove(&name),
        };
    }

    pub fn fail_uploads(&self) {
        self.failing_uploads.store(true, Ordering::SeqCst);
    }

    /// Uploads wait until the returned gate is notified.
    pub fn hold_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RuntimeClient for FakeRuntime {
    async fn probe_status(
        &self,
        container: &str,
        name: CamelStatusName,
        _timeout: Duration,
    ) -> Option<String> {
        self.record(Call::Probe(container.to_string(), name));
        self.statuses.lock().unwrap().get(&name).cloned()
    }

    async fn upload_file(
        &self,
        container: &str,
        file_name: &str,
        _body: &str,
        _timeout: Duration,
    ) -> bool {
        self.record(Call::Upload(container.to_string(), file_name.to_string()));
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        !self.failing_uploads.load(Ordering::SeqCst)
    }

    async fn trigger_reload(&self, container: &str, _timeout: Duration) -> Option<String> {
        self.record(Call::Reload(container.to_string()));
        Some("{\"reloaded\": true}".to_string())
    }
}

/// A ready in-memory store plus its port view.
pub fn ready_store() -> (StateStore, Arc<dyn StatusStore>) {
    let store = StateStore::open_in_memory().unwrap();
    store.start();
    let port: Arc<dyn StatusStore> = Arc::new(store.clone());
    (store, port)
}

/// A queue whose handler just records the items it receives.
pub fn capture_queue<T: Send + 'static>(address: &str) -> (OrderedQueue<T>, Arc<Mutex<Vec<T>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: Handler<T> = Arc::new(move |item: T| -> HandlerFuture {
        sink.lock().unwrap().push(item);
        Box::pin(async {})
    });
    (OrderedQueue::spawn(address, 64, WorkerPool::new(1), handler), seen)
}

/// Store wrapper that fails selected operations and delegates the rest.
pub struct FlakyStore {
    pub inner: StateStore,
    pub fail_save: Option<CamelStatusName>,
    pub fail_delete: Option<CamelStatusName>,
    pub fail_pod_lookup: Option<String>,
}

impl FlakyStore {
    pub fn new(inner: StateStore) -> Self {
        Self {
            inner,
            fail_save: None,
            fail_delete: None,
            fail_pod_lookup: None,
        }
    }
}

fn injected(what: &str) -> StateError {
    StateError::Write(format!("injected failure: {what}"))
}

impl StatusStore for FlakyStore {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn save_environment(&self, env: &Environment) -> StateResult<()> {
        self.inner.save_environment(env)
    }

    fn get_environment(&self, name: &str) -> StateResult<Option<Environment>> {
        self.inner.get_environment(name)
    }

    fn list_projects(&self) -> StateResult<Vec<Project>> {
        self.inner.list_projects()
    }

    fn put_project(&self, project: &Project) -> StateResult<()> {
        self.inner.put_project(project)
    }

    fn get_project_files(&self, project_id: &str) -> StateResult<Vec<ProjectFile>> {
        self.inner.get_project_files(project_id)
    }

    fn put_project_file(&self, file: &ProjectFile) -> StateResult<()> {
        self.inner.put_project_file(file)
    }

    fn list_devmode_statuses(&self) -> StateResult<Vec<DevModeStatus>> {
        self.inner.list_devmode_statuses()
    }

    fn get_devmode_status(&self, project_id: &str) -> StateResult<Option<DevModeStatus>> {
        self.inner.get_devmode_status(project_id)
    }

    fn put_devmode_status(&self, status: &DevModeStatus) -> StateResult<()> {
        self.inner.put_devmode_status(status)
    }

    fn delete_devmode_status(&self, project_id: &str) -> StateResult<bool> {
        self.inner.delete_devmode_status(project_id)
    }

    fn list_pod_statuses(&self, environment: &str) -> StateResult<Vec<PodStatus>> {
        self.inner.list_pod_statuses(environment)
    }

    fn get_devmode_pod_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> StateResult<Option<PodStatus>> {
        if self.fail_pod_lookup.as_deref() == Some(project_id) {
            return Err(injected(project_id));
        }
        self.inner.get_devmode_pod_status(project_id, environment)
    }

    fn put_pod_status(&self, pod: &PodStatus) -> StateResult<()> {
        self.inner.put_pod_status(pod)
    }

    fn delete_pod_status(&self, environment: &str, name: &str) -> StateResult<bool> {
        self.inner.delete_pod_status(environment, name)
    }

    fn save_camel_status(&self, status: &CamelStatus) -> StateResult<()> {
        if self.fail_save == Some(status.name) {
            return Err(injected(status.name.as_str()));
        }
        self.inner.save_camel_status(status)
    }

    fn get_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<Option<CamelStatus>> {
        self.inner.get_camel_status(project_id, name, environment)
    }

    fn list_camel_statuses(&self, project_id: &str, environment: &str) -> StateResult<Vec<CamelStatus>> {
        self.inner.list_camel_statuses(project_id, environment)
    }

    fn delete_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<bool> {
        if self.fail_delete == Some(name) {
            return Err(injected(name.as_str()));
        }
        self.inner.delete_camel_status(project_id, name, environment)
    }
}
