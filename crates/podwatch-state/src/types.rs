//! Domain types for the podwatch state store.
//!
//! These types represent environments, projects and their files, devmode
//! sessions, discovered pods, and per-container runtime status records.
//! All types are serializable to/from JSON for storage in redb tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a project (and of the integration it deploys).
pub type ProjectId = String;

// ── Environment ───────────────────────────────────────────────────

/// The deployment environment this process serves.
///
/// Written once at startup and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub cluster: String,
    pub namespace: String,
    pub pipeline: String,
}

// ── Projects ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
}

/// A single source file belonging to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectFile {
    pub project_id: ProjectId,
    /// File name, used verbatim as the upload path segment.
    pub name: String,
    pub code: String,
}

// ── Devmode & pods ────────────────────────────────────────────────

/// A container believed to be running in interactive development mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevModeStatus {
    pub project_id: ProjectId,
    pub container_name: String,
}

/// A running pod as reported by the cluster watchers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodStatus {
    pub project_id: ProjectId,
    /// Pod name; doubles as the container's DNS name.
    pub name: String,
    pub environment: String,
}

// ── Runtime status ────────────────────────────────────────────────

/// Status categories exposed by a runtime container, one endpoint each
/// under `/q/dev/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamelStatusName {
    Context,
    Health,
    Endpoints,
    Inflight,
    Memory,
    Properties,
    Route,
    Trace,
    Jvm,
}

impl CamelStatusName {
    /// Every status name, in probe order.
    pub const ALL: [CamelStatusName; 9] = [
        CamelStatusName::Context,
        CamelStatusName::Health,
        CamelStatusName::Endpoints,
        CamelStatusName::Inflight,
        CamelStatusName::Memory,
        CamelStatusName::Properties,
        CamelStatusName::Route,
        CamelStatusName::Trace,
        CamelStatusName::Jvm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CamelStatusName::Context => "context",
            CamelStatusName::Health => "health",
            CamelStatusName::Endpoints => "endpoints",
            CamelStatusName::Inflight => "inflight",
            CamelStatusName::Memory => "memory",
            CamelStatusName::Properties => "properties",
            CamelStatusName::Route => "route",
            CamelStatusName::Trace => "trace",
            CamelStatusName::Jvm => "jvm",
        }
    }
}

impl fmt::Display for CamelStatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CamelStatusName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CamelStatusName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown status name: {s}"))
    }
}

/// Last successful probe result for one (container, status name) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CamelStatus {
    pub project_id: ProjectId,
    pub container_name: String,
    pub name: CamelStatusName,
    /// Pretty-printed JSON body returned by the container.
    pub status: String,
    pub environment: String,
}

/// Work item asking for every status of one container to be collected.
///
/// Travels through the dispatch queue only; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CamelStatusRequest {
    pub project_id: ProjectId,
    pub container_name: String,
}

impl From<&DevModeStatus> for CamelStatusRequest {
    fn from(dms: &DevModeStatus) -> Self {
        Self {
            project_id: dms.project_id.clone(),
            container_name: dms.container_name.clone(),
        }
    }
}

impl From<&PodStatus> for CamelStatusRequest {
    fn from(pod: &PodStatus) -> Self {
        Self {
            project_id: pod.project_id.clone(),
            container_name: pod.name.clone(),
        }
    }
}

impl ProjectFile {
    /// Build the composite key for the project files table.
    pub fn table_key(&self) -> String {
        project_file_key(&self.project_id, &self.name)
    }
}

impl PodStatus {
    /// Build the composite key for the pod statuses table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.environment, self.name)
    }

    /// Whether this pod backs the devmode session of `project_id`.
    pub fn is_devmode_for(&self, project_id: &str) -> bool {
        self.project_id == project_id
            && self
                .name
                .starts_with(&podwatch_core::devmode_container_name(project_id))
    }
}

impl CamelStatus {
    /// Build the composite key for the camel statuses table.
    pub fn table_key(&self) -> String {
        camel_status_key(&self.project_id, self.name, &self.environment)
    }
}

pub(crate) fn project_file_key(project_id: &str, name: &str) -> String {
    format!("{project_id}/{name}")
}

pub(crate) fn camel_status_key(project_id: &str, name: CamelStatusName, environment: &str) -> String {
    format!("{project_id}:{name}:{environment}")
}
