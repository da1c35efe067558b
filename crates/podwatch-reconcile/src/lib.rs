//! podwatch-reconcile — the reconciliation engine.
//!
//! Three periodic loops keep the status store in line with the fleet:
//!
//! ```text
//! devmode collection  ──┐
//!   (every devmode_status)├─▶ collect-camel-status ─▶ probe every status name,
//! production collection ─┘                            upsert on success
//!   (every camel_status)
//! devmode cleanup ───────────▶ delete-camel-status  ─▶ drop status rows and
//!   (every devmode_status)                            the devmode session
//! ```
//!
//! Loops never overlap themselves: a tick that finds the previous run of
//! the same loop still executing is skipped. Handlers run behind the
//! ordered queues from `podwatch-dispatch`, one item at a time per queue.
//!
//! The [`ReloadOrchestrator`] pushes a project's files into its devmode
//! container and asks the runtime to reload, and decides from successive
//! `context` payloads whether a reload is warranted at all.

pub mod collector;
pub mod error;
pub mod reload;
pub mod scheduler;
pub mod settings;
pub mod ticker;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{ContextCallback, ContextChange, ContextFuture, StatusCollector};
pub use error::{ReconcileError, ReconcileResult};
pub use reload::{BackgroundReloads, ReloadOrchestrator, ReloadOutcome, context_state, should_reload};
pub use scheduler::Reconciler;
pub use settings::ReconcileSettings;
pub use ticker::{PeriodicTask, TickFn, TickFuture};
