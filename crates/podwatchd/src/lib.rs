//! podwatchd — the podwatch daemon.
//!
//! Assembles the status store, the runtime client, the reconciliation
//! engine, and a small HTTP surface into one process:
//!
//! ```text
//! open store ─▶ bootstrap ─▶ reconciler (3 loops, 2 queues) ─▶ axum server
//!               │  save Environment
//!               │  import-projects (first start only)
//!               │  import-kamelets
//!               └─ start-watchers
//! ```

pub mod api;
pub mod bootstrap;
pub mod daemon;
