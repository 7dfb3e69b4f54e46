//! Invocation result types.

use serde::{Deserialize, Serialize};

use crate::types::{ErrorDetail, ExecutionDescription, ExecutionHandle, ExecutionState};

/// What produced a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    /// A workflow execution reached a failed terminal state.
    Execution,
    /// A remote function raised.
    Function,
    /// A spawned subprocess exited non-zero.
    Subprocess,
}

impl std::fmt::Display for FailureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureSource::Execution => write!(f, "execution"),
            FailureSource::Function => write!(f, "function"),
            FailureSource::Subprocess => write!(f, "subprocess"),
        }
    }
}

/// Resolved outcome of a workflow run, function invocation or subprocess call.
///
/// Remote failures are normal outcomes here; they only become errors once
/// rendered by [`crate::mapper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvocationResult {
    Success {
        output: serde_json::Value,
    },
    Failure {
        source: FailureSource,
        error: ErrorDetail,
        /// Exit code of a failed subprocess.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
}

impl InvocationResult {
    /// Create a successful result.
    pub fn success(output: serde_json::Value) -> Self {
        InvocationResult::Success { output }
    }

    /// Create a failed result without an exit code.
    pub fn failure(source: FailureSource, error: ErrorDetail) -> Self {
        InvocationResult::Failure {
            source,
            error,
            exit_code: None,
        }
    }

    /// Create a result from a finished subprocess.
    pub fn from_exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        if exit_code == 0 {
            return InvocationResult::success(parse_stdout(stdout));
        }

        let message = match stderr.trim() {
            "" => format!("Command exited with code {}", exit_code),
            trimmed => trimmed.to_string(),
        };

        InvocationResult::Failure {
            source: FailureSource::Subprocess,
            error: ErrorDetail::new("SubprocessFailure", message),
            exit_code: Some(exit_code),
        }
    }

    /// Build the result for a terminal execution description.
    ///
    /// Returns `None` while the execution is still running.
    pub fn from_description(description: &ExecutionDescription) -> Option<Self> {
        match description.state {
            ExecutionState::Running => None,
            ExecutionState::Succeeded => Some(InvocationResult::success(
                description.output.clone().unwrap_or(serde_json::Value::Null),
            )),
            state => {
                let error = description.error.clone().unwrap_or_else(|| {
                    ErrorDetail::new(
                        state.to_string(),
                        default_failure_message(state, &description.handle),
                    )
                });
                Some(InvocationResult::failure(FailureSource::Execution, error))
            }
        }
    }

    /// Returns true if the result indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    /// Output payload, if successful.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match self {
            InvocationResult::Success { output } => Some(output),
            InvocationResult::Failure { .. } => None,
        }
    }

    /// Error detail, if failed.
    pub fn error(&self) -> Option<&ErrorDetail> {
        match self {
            InvocationResult::Success { .. } => None,
            InvocationResult::Failure { error, .. } => Some(error),
        }
    }
}

fn default_failure_message(state: ExecutionState, handle: &ExecutionHandle) -> String {
    match state {
        ExecutionState::Aborted => format!("Execution {} was aborted", handle.execution_id),
        ExecutionState::TimedOut => format!("Execution {} timed out", handle.execution_id),
        _ => "last error not recorded".to_string(),
    }
}

/// Subprocess stdout becomes JSON output when it parses, a string otherwise.
fn parse_stdout(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(trimmed)
        .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description(state: ExecutionState) -> ExecutionDescription {
        ExecutionDescription {
            state,
            ..ExecutionDescription::running(ExecutionHandle::new("exec-1", "wf"))
        }
    }

    #[test]
    fn test_result_serialization() {
        let result = InvocationResult::success(json!({"count": 42}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"status": "success", "output": {"count": 42}}));

        let result =
            InvocationResult::failure(FailureSource::Execution, ErrorDetail::new("Boom", "bad"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["source"], "execution");
        assert_eq!(value["error"]["kind"], "Boom");
        assert!(value.get("exit_code").is_none());
    }

    #[test]
    fn test_from_description_running() {
        assert!(InvocationResult::from_description(&description(ExecutionState::Running)).is_none());
    }

    #[test]
    fn test_from_description_success() {
        let mut desc = description(ExecutionState::Succeeded);
        desc.output = Some(json!({"id": "item-42"}));
        let result = InvocationResult::from_description(&desc).unwrap();
        assert_eq!(result.output(), Some(&json!({"id": "item-42"})));
    }

    #[test]
    fn test_from_description_failure_keeps_remote_error() {
        let mut desc = description(ExecutionState::Failed);
        desc.error = Some(ErrorDetail::new("States.TaskFailed", "task blew up"));
        let result = InvocationResult::from_description(&desc).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error().unwrap().kind, "States.TaskFailed");
    }

    #[test]
    fn test_from_description_aborted_without_error() {
        let result =
            InvocationResult::from_description(&description(ExecutionState::Aborted)).unwrap();
        let error = result.error().unwrap();
        assert_eq!(error.kind, "ABORTED");
        assert!(error.message.contains("exec-1"));
    }

    #[test]
    fn test_from_exit() {
        let result = InvocationResult::from_exit(0, "{\"ok\": true}\n", "");
        assert_eq!(result.output(), Some(&json!({"ok": true})));

        let result = InvocationResult::from_exit(0, "plain text\n", "");
        assert_eq!(result.output(), Some(&json!("plain text")));

        let result = InvocationResult::from_exit(7, "", "went wrong\n");
        match result {
            InvocationResult::Failure {
                source,
                error,
                exit_code,
            } => {
                assert_eq!(source, FailureSource::Subprocess);
                assert_eq!(error.message, "went wrong");
                assert_eq!(exit_code, Some(7));
            }
            _ => panic!("expected failure"),
        }
    }
}
