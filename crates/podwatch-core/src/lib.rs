//! podwatch-core — configuration and shared constants for podwatch.
//!
//! podwatch keeps a store of live status records for a fleet of
//! integration-runtime containers. Every other crate in the workspace
//! depends on the names defined here.

pub mod config;
pub mod duration;

pub use config::PodwatchConfig;
pub use duration::parse_duration;

/// Suffix appended to a project id to form its devmode container name.
pub const DEVMODE_SUFFIX: &str = "devmode";

/// Devmode container name for a project: `<projectId>-devmode`.
pub fn devmode_container_name(project_id: &str) -> String {
    format!("{project_id}-{DEVMODE_SUFFIX}")
}

/// Project id for a devmode container name, if it carries the suffix.
pub fn project_from_devmode_container(container: &str) -> Option<&str> {
    container
        .strip_suffix(DEVMODE_SUFFIX)
        .and_then(|rest| rest.strip_suffix('-'))
        .filter(|project| !project.is_empty())
}
