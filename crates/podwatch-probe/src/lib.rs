//! podwatch-probe — calls into integration-runtime containers.
//!
//! Provides the runtime client used to probe status endpoints, upload
//! project files, and trigger reloads, plus the circuit breakers that
//! guard those calls and the cluster identity port used to address
//! containers.
//!
//! # Architecture
//!
//! ```text
//! HttpRuntimeClient (one per process)
//!   ├── hyper-util pooled client
//!   ├── resolver: container name → base address (ClusterInfo)
//!   └── BreakerRegistry
//!       ├── probe   GET /q/dev/<status>
//!       ├── upload  PUT /q/upload/<file>
//!       └── reload  GET /q/dev/reload?reload=true
//! ```
//!
//! Failures degrade to `None` / `false` and are only logged: a circuit-open
//! rejection at `debug`, a transport failure or timeout at `info`.

pub mod breaker;
pub mod client;
pub mod cluster;
pub mod error;

pub use breaker::{BreakerRegistry, BreakerSettings, CallKind, CircuitBreaker, CircuitState};
pub use client::{HttpRuntimeClient, RuntimeClient};
pub use cluster::{ClusterInfo, StaticCluster, container_address};
pub use error::{ProbeError, ProbeResult};
