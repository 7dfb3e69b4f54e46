//! Error types.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ErrorDetail, ExecutionHandle};

/// Errors surfaced to callers of the execution manager.
///
/// `InvalidPayload`, `Launch`, `UnknownRun` and `Timeout` are infrastructure
/// errors and keep their kind all the way to the exit code. `ExecutionFailure`,
/// `FunctionFailure` and `SubprocessFailure` are terminal outcomes that only
/// become errors when rendered for library callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload rejected locally; nothing was sent.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The remote side rejected a start or invocation.
    #[error("Launch rejected: {0}")]
    Launch(String),

    /// No run record exists for the logical run identifier.
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// No terminal state within the allotted time. Resumable via `handle`.
    #[error("Timed out after {}s waiting for {target}", .waited.as_secs())]
    Timeout {
        target: String,
        handle: Option<ExecutionHandle>,
        waited: Duration,
    },

    /// The caller cancelled the wait. The remote side is untouched.
    #[error("Cancelled while waiting for {target}")]
    Cancelled {
        target: String,
        handle: Option<ExecutionHandle>,
    },

    /// The workflow execution reported a terminal failure.
    #[error("Execution failed: {0}")]
    ExecutionFailure(ErrorDetail),

    /// The remote function raised an error.
    #[error("Function failed: {0}")]
    FunctionFailure(ErrorDetail),

    /// A spawned subprocess exited non-zero.
    #[error("Subprocess exited with code {code}: {message}")]
    SubprocessFailure { code: i32, message: String },

    /// The execution started but could not be linked to its run record.
    #[error("Execution {handle} started but was not recorded for run {run_id}: {reason}")]
    Unrecorded {
        run_id: String,
        handle: ExecutionHandle,
        reason: String,
    },

    /// Transport or protocol failure talking to a collaborator.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable kind name used in process-mode error lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidPayload(_) => "InvalidPayloadError",
            Error::Launch(_) => "LaunchError",
            Error::UnknownRun(_) => "UnknownRunError",
            Error::Timeout { .. } => "TimeoutError",
            Error::Cancelled { .. } => "Cancelled",
            Error::ExecutionFailure(_) => "ExecutionFailure",
            Error::FunctionFailure(_) => "FunctionFailure",
            Error::SubprocessFailure { .. } => "SubprocessFailure",
            Error::Unrecorded { .. } => "UnrecordedExecution",
            Error::Remote(_) => "RemoteError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
        }
    }

    /// Handle a caller can poll again later, if any.
    pub fn resumable_handle(&self) -> Option<&ExecutionHandle> {
        match self {
            Error::Timeout { handle, .. } | Error::Cancelled { handle, .. } => handle.as_ref(),
            Error::Unrecorded { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the remote collaborators (engine, store, functions).
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The request was understood and refused.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The addressed object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service could not be reached or failed internally.
    #[error("transport: {0}")]
    Transport(String),

    /// The service answered with something we cannot decode.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Malformed(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownRun("item-42".to_string());
        assert_eq!(err.to_string(), "Unknown run: item-42");

        let err = Error::Timeout {
            target: "exec-1".to_string(),
            handle: None,
            waited: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Timed out after 5s waiting for exec-1");

        let err = Error::ExecutionFailure(ErrorDetail::new("States.TaskFailed", "boom"));
        assert_eq!(err.to_string(), "Execution failed: States.TaskFailed: boom");
    }

    #[test]
    fn test_resumable_handle() {
        let handle = ExecutionHandle::new("exec-1", "wf");
        let err = Error::Timeout {
            target: "exec-1".to_string(),
            handle: Some(handle.clone()),
            waited: Duration::from_secs(1),
        };
        assert_eq!(err.resumable_handle(), Some(&handle));
        assert!(Error::Launch("nope".to_string()).resumable_handle().is_none());
    }

    #[test]
    fn test_error_from_remote() {
        let err: Error = RemoteError::Transport("connection refused".to_string()).into();
        assert!(matches!(err, Error::Remote(RemoteError::Transport(_))));
        assert_eq!(err.kind(), "RemoteError");
    }

    #[test]
    fn test_remote_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: RemoteError = json_err.into();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }
}
