//! redb table definitions for the podwatch state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Environment records keyed by `{name}`.
pub const ENVIRONMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("environments");

/// Projects keyed by `{project_id}`.
pub const PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");

/// Project files keyed by `{project_id}/{file_name}`.
pub const PROJECT_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("project_files");

/// Devmode sessions keyed by `{project_id}`.
pub const DEVMODE_STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("devmode_statuses");

/// Discovered pods keyed by `{environment}/{pod_name}`.
pub const POD_STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("pod_statuses");

/// Runtime status payloads keyed by `{project_id}:{status_name}:{environment}`.
pub const CAMEL_STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("camel_statuses");
