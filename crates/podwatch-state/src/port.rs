//! The store port consumed by the reconciliation engine.
//!
//! The engine never talks to redb directly; it holds an
//! `Arc<dyn StatusStore>` so the backing store can be swapped
//! (or faked) without touching the loops or handlers.

use crate::error::StateResult;
use crate::types::*;

/// Narrow get/put/delete interface over the entities the engine touches.
pub trait StatusStore: Send + Sync {
    /// Whether the store has finished starting up. Loops no-op until it has.
    fn is_ready(&self) -> bool;

    // ── Environment ────────────────────────────────────────────────

    fn save_environment(&self, env: &Environment) -> StateResult<()>;
    fn get_environment(&self, name: &str) -> StateResult<Option<Environment>>;

    // ── Projects ───────────────────────────────────────────────────

    fn list_projects(&self) -> StateResult<Vec<Project>>;
    fn put_project(&self, project: &Project) -> StateResult<()>;
    fn get_project_files(&self, project_id: &str) -> StateResult<Vec<ProjectFile>>;
    fn put_project_file(&self, file: &ProjectFile) -> StateResult<()>;

    // ── Devmode ────────────────────────────────────────────────────

    fn list_devmode_statuses(&self) -> StateResult<Vec<DevModeStatus>>;
    fn get_devmode_status(&self, project_id: &str) -> StateResult<Option<DevModeStatus>>;
    fn put_devmode_status(&self, status: &DevModeStatus) -> StateResult<()>;
    /// Returns true if the row existed.
    fn delete_devmode_status(&self, project_id: &str) -> StateResult<bool>;

    // ── Pods ───────────────────────────────────────────────────────

    fn list_pod_statuses(&self, environment: &str) -> StateResult<Vec<PodStatus>>;
    /// The pod backing `project_id`'s devmode session in `environment`, if any.
    fn get_devmode_pod_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> StateResult<Option<PodStatus>>;
    fn put_pod_status(&self, pod: &PodStatus) -> StateResult<()>;
    fn delete_pod_status(&self, environment: &str, name: &str) -> StateResult<bool>;

    // ── Runtime status ─────────────────────────────────────────────

    /// Upsert; at most one row per (project, status name, environment).
    fn save_camel_status(&self, status: &CamelStatus) -> StateResult<()>;
    fn get_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<Option<CamelStatus>>;
    fn list_camel_statuses(&self, project_id: &str, environment: &str)
    -> StateResult<Vec<CamelStatus>>;
    fn delete_camel_status(
        &self,
        project_id: &str,
        name: CamelStatusName,
        environment: &str,
    ) -> StateResult<bool>;
}
