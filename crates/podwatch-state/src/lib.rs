//! podwatch-state — status store for podwatch.
//!
//! Defines the data model (environments, projects, devmode sessions, pods,
//! runtime status records), the [`StatusStore`] port the reconciliation
//! engine is written against, and [`StateStore`], its redb-backed adapter.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{project_id}/{file}`, `{environment}/{pod}`,
//! `{project_id}:{status}:{environment}`) enable prefix scans for related
//! records.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod port;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use port::StatusStore;
pub use store::StateStore;
pub use types::*;
