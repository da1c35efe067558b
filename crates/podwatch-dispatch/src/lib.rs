//! podwatch-dispatch — ordered work delivery between the loops and handlers.
//!
//! The reconciliation loops never call handlers directly. They publish work
//! items to a named [`OrderedQueue`]; the queue's single consumer hands them
//! to the handler strictly one at a time, in publish order. Handlers run on
//! a shared, bounded [`WorkerPool`], so the number of handlers doing network
//! I/O at once never exceeds the pool size.
//!
//! One-shot startup signals (`import-projects`, `import-kamelets`,
//! `start-watchers`) travel on the broadcast [`SignalBus`] instead.

pub mod error;
pub mod queue;
pub mod signals;

pub use error::{DispatchError, DispatchResult};
pub use queue::{Handler, HandlerFuture, OrderedQueue, QueuePublisher, WorkerPool};
pub use signals::{Signal, SignalBus};

/// Address of the queue carrying status collection requests.
pub const COLLECT_CAMEL_STATUS: &str = "collect-camel-status";

/// Address of the queue carrying devmode cleanup requests.
pub const DELETE_CAMEL_STATUS: &str = "delete-camel-status";
