//! Outcome mapping for library and process callers.
//!
//! Coordination code only ever produces `Result<InvocationResult>`. The two
//! renderers here turn that into either a typed return value or an exit code
//! with output on stdout and detail on stderr.

use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::outcome::{FailureSource, InvocationResult};

/// Success.
pub const EXIT_SUCCESS: i32 = 0;
/// Workflow or function reported a failure.
pub const EXIT_FAILURE: i32 = 1;
/// Local timeout while waiting.
pub const EXIT_TIMEOUT: i32 = 2;
/// Invalid invocation: bad payload, unknown run, rejected launch.
pub const EXIT_INVALID: i32 = 3;
/// Infrastructure failure talking to a collaborator.
pub const EXIT_INFRA: i32 = 4;
/// Cancelled by the caller.
pub const EXIT_CANCELLED: i32 = 130;

/// Library rendering: the output payload on success, a typed error otherwise.
pub fn into_library(result: Result<InvocationResult>) -> Result<serde_json::Value> {
    match result? {
        InvocationResult::Success { output } => Ok(output),
        InvocationResult::Failure {
            source,
            error,
            exit_code,
        } => Err(match source {
            FailureSource::Execution => Error::ExecutionFailure(error),
            FailureSource::Function => Error::FunctionFailure(error),
            FailureSource::Subprocess => Error::SubprocessFailure {
                code: subprocess_code(exit_code),
                message: error.message,
            },
        }),
    }
}

/// Exit code for an outcome.
pub fn exit_code(result: &Result<InvocationResult>) -> i32 {
    match result {
        Ok(InvocationResult::Success { .. }) => EXIT_SUCCESS,
        Ok(InvocationResult::Failure {
            source: FailureSource::Subprocess,
            exit_code,
            ..
        }) => subprocess_code(*exit_code),
        Ok(InvocationResult::Failure { .. }) => EXIT_FAILURE,
        Err(e) => error_exit_code(e),
    }
}

/// Exit code for an error, driven by its kind.
pub fn error_exit_code(error: &Error) -> i32 {
    match error {
        Error::ExecutionFailure(_) | Error::FunctionFailure(_) => EXIT_FAILURE,
        Error::SubprocessFailure { code, .. } => subprocess_code(Some(*code)),
        Error::Timeout { .. } => EXIT_TIMEOUT,
        Error::InvalidPayload(_) | Error::Launch(_) | Error::UnknownRun(_) => EXIT_INVALID,
        Error::Cancelled { .. } => EXIT_CANCELLED,
        Error::Unrecorded { .. }
        | Error::Remote(_)
        | Error::Config(_)
        | Error::Io(_)
        | Error::Json(_) => EXIT_INFRA,
    }
}

/// A failed subprocess never maps to zero.
fn subprocess_code(code: Option<i32>) -> i32 {
    match code {
        Some(code) if code != 0 => code,
        _ => EXIT_FAILURE,
    }
}

/// Process rendering: output to `out`, detail to `err`, exit code returned.
pub struct ProcessRenderer<O: Write, E: Write> {
    out: O,
    err: E,
    raw: bool,
    out_path: Option<PathBuf>,
}

impl ProcessRenderer<std::io::Stdout, std::io::Stderr> {
    /// Renderer writing to the process' stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> ProcessRenderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            raw: false,
            out_path: None,
        }
    }

    /// Print compact JSON instead of pretty JSON, and strings unquoted.
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Also write the rendered document to a file.
    pub fn out_path(mut self, path: Option<PathBuf>) -> Self {
        self.out_path = path;
        self
    }

    /// Render an outcome and return the exit code.
    pub fn render(&mut self, result: Result<InvocationResult>) -> i32 {
        let code = exit_code(&result);

        let written = match &result {
            Ok(InvocationResult::Success { output }) => self
                .write_document(output)
                .and_then(|_| self.write_out_file(output)),
            Ok(InvocationResult::Failure { source, error, .. }) => {
                let line = writeln!(self.err, "{} failure: {}", source, error).map_err(Error::from);
                line.and_then(|_| {
                    self.write_out_file(&serde_json::json!({ "last_error": error }))
                })
            }
            Err(e) => self.write_error(e),
        };

        match written {
            Ok(()) => code,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write result");
                if code == EXIT_SUCCESS {
                    EXIT_INFRA
                } else {
                    code
                }
            }
        }
    }

    /// Render any serializable document as a successful result.
    pub fn render_document<T: serde::Serialize>(&mut self, document: &T) -> i32 {
        let result = serde_json::to_value(document)
            .map(InvocationResult::success)
            .map_err(Error::from);
        self.render(result)
    }

    fn write_document(&mut self, document: &serde_json::Value) -> Result<()> {
        let text = if self.raw {
            match document {
                serde_json::Value::String(text) => text.trim_end_matches('\n').to_string(),
                other => serde_json::to_string(other)?,
            }
        } else {
            serde_json::to_string_pretty(document)?
        };
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    fn write_error(&mut self, error: &Error) -> Result<()> {
        writeln!(self.err, "{}: {}", error.kind(), error)?;
        if let Some(handle) = error.resumable_handle() {
            writeln!(
                self.err,
                "execution {} of workflow {} can be resumed",
                handle.execution_id, handle.workflow
            )?;
        }
        Ok(())
    }

    fn write_out_file(&self, document: &serde_json::Value) -> Result<()> {
        if let Some(path) = &self.out_path {
            let mut text = serde_json::to_string_pretty(document)?;
            text.push('\n');
            std::fs::write(path, text)?;
        }
        Ok(())
    }
}
