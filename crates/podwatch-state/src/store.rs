//! StateStore — redb-backed implementation of the [`StatusStore`] port.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing). A freshly opened store reports "not ready" until [`start`]
//! is called, so the periodic loops stay idle through bootstrap.
//!
//! [`start`]: StateStore::start

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::port::StatusStore;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    ready: Arc<AtomicBool>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_database(db);
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_database(db);
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the store ready for the reconciliation loops.
    pub fn start(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!("state store ready");
        }
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [
            ENVIRONMENTS,
            PROJECTS,
            PROJECT_FILES,
            DEVMODE_STATUSES,
            POD_STATUSES,
            CAMEL_STATUSES,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic JSON row helpers ───────────────────────────────────

    fn put_json<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Every row whose key starts with `prefix` (empty prefix lists the table).
    fn list_json<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let row: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(row);
            }
        }
        Ok(results)
    }

    fn remove(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

impl StatusStore for StateStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    // ── Environment ────────────────────────────────────────────────

    fn save_environment(&self, env: &Environment) -> StateResult<()> {
        self.put_json(ENVIRONMENTS, &env.name, env)?;
        debug!(name = %env.name, cluster = %env.cluster, namespace = %env.namespace, "environment stored");
        Ok(())
    }

    fn get_environment(&self, name: &str) -> StateResult<Option<Environment>> {
        self.get_json(ENVIRONMENTS, name)
    }

    // ── Projects ───────────────────────────────────────────────────

    fn list_projects(&self) -> StateResult<Vec<Project>> {
        self.list_json(PROJECTS, "")
    }

    fn put_project(&self, project: &Project) -> StateResult<()> {
        self.put_json(PROJECTS, &project.project_id, project)
    }

    fn get_project_files(&self, project_id: &str) -> StateResult<Vec<ProjectFile>> {
        let prefix = project_file_key(project_id, "");
        self.list_json(PROJECT_FILES, &prefix)
    }

    fn put_project_file(&self, file: &ProjectFile) -> StateResult<()> {
        self.put_json(PROJECT_FILES, &file.table_key(), file)
    }

    // ── Devmode ────────────────────────────────────────────────────

    fn list_devmode_statuses(&self) -> StateResult<Vec<DevModeStatus>> {
        self.list_json(DEVMODE_STATUSES, "")
    }

    fn get_devmode_status(&self, project_id: &str) -> StateResult<Option<DevModeStatus>> {
        self.get_json(DEVMODE_STATUSES, project_id)
    }

    fn put_devmode_status(&self, status: &DevModeStatus) -> StateResult<()> {
        self.put_json(DEVMODE_STATUSES, &status.project_id, status)?;
        debug!(project_id = %status.project_id, container = %status.container_name, "devmode status stored");
        Ok(())
    }

    fn delete_devmode_status(&self, project_id: &str) -> StateResult<bool> {
        let existed = self.remove(DEVMODE_STATUSES, project_id)?;
        debug!(%project_id, existed, "devmode status deleted");
        Ok(existed)
    }

    // ── Pods ───────────────────────────────────────────────────────

    fn list_pod_statuses(&self, environment: &str) -> StateResult<Vec<PodStatus>> {
        let prefix = format!("{environment}/");
        self.list_json(POD_STATUSES, &prefix)
    }

    fn get_devmode_pod_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> StateResult<Option<PodStatus>> {
        Ok(self
            .list_pod_statuses(environment)?
            .into_iter()
            .find(|pod| pod.is_devmode_for(project_id)))
    }

    fn put_pod_status(&self, pod: &PodStatus) -> StateResult<()> {
        self.put_json(POD_STATUSES, &pod.table_key(), pod)
    }

    fn delete_pod_status(&self, environment: &str, name: &str) -> StateResult<bool> {
        self.remove(POD_STATUSES, &format!("{environment}/{name}"))
    }

    // ── Runtime status ─────────────────────────────────────────────

    fn save_camel_status(&self, status: &CamelStatus) -> StateResult<()> {
        self.put_json(CAMEL_STATUSES, &status.table_key(), status)
    }

    fn get_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<Option<CamelStatus>> {
        self.get_json(CAMEL_STATUSES, &camel_status_key(project_id, name, environment))
    }

    fn list_camel_statuses(
        &self,
        project_id: &str,
        environment: &str,
    ) -> StateResult<Vec<CamelStatus>> {
        let prefix = format!("{project_id}:");
        let rows: Vec<CamelStatus> = self.list_json(CAMEL_STATUSES, &prefix)?;
        Ok(rows
            .into_iter()
            .filter(|cs| cs.project_id == project_id && cs.environment == environment)
            .collect())
    }

    fn delete_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<bool> {
        self.remove(CAMEL_STATUSES, &camel_status_key(project_id, name, environment))
    }
}
