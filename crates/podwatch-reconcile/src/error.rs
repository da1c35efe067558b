use podwatch_dispatch::DispatchError;
use podwatch_state::StateError;

/// Errors surfaced by a loop tick or a queue handler.
///
/// None of these are fatal: the caller logs them and the next tick retries.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StateError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("reload already running for project {0}")]
    ReloadInProgress(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
