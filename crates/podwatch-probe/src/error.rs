//! Runtime client error types.
//!
//! None of these reach the reconciliation loops: the client logs them and
//! degrades to "absent" (or `false` for uploads).

use thiserror::Error;

use crate::breaker::CallKind;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("circuit open for {0} calls")]
    CircuitOpen(CallKind),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("response body is not JSON: {0}")]
    InvalidBody(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
