//! Dispatch error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The queue's consumer has shut down; the item was not accepted.
    #[error("queue {0} is closed")]
    Closed(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
