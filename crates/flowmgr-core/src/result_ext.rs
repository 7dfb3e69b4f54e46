//! Logging for coordination errors on their way out to the caller.

use crate::error::{Error, Result};

/// Log an `Err` once, where it leaves the manager, then hand it back.
pub trait ResultExt<T> {
    /// Log the error under `operation` if this is an `Err`.
    ///
    /// Errors the caller caused or can act on (bad payload, unknown run,
    /// timeout, cancellation) log at warn with the execution that can be
    /// resumed, if any. Collaborator and local I/O failures log at error.
    fn log(self, operation: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn log(self, operation: &str) -> Result<T> {
        if let Err(ref e) = self {
            let caller = std::panic::Location::caller();
            let location = format!("{}:{}", caller.file(), caller.line());
            let execution_id = e.resumable_handle().map(|h| h.execution_id.as_str());

            if is_caller_facing(e) {
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    execution_id,
                    location = %location,
                    "{} failed",
                    operation
                );
            } else {
                tracing::error!(
                    kind = e.kind(),
                    error = %e,
                    execution_id,
                    location = %location,
                    "{} failed",
                    operation
                );
            }
        }
        self
    }
}

fn is_caller_facing(error: &Error) -> bool {
    matches!(
        error,
        Error::InvalidPayload(_)
            | Error::UnknownRun(_)
            | Error::Timeout { .. }
            | Error::Cancelled { .. }
            | Error::ExecutionFailure(_)
            | Error::FunctionFailure(_)
            | Error::SubprocessFailure { .. }
    )
}
