//! Execution and run record types shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of one execution attempt as reported by the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Still running.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with a failure.
    Failed,
    /// The engine itself gave up on the execution.
    TimedOut,
    /// Stopped by an operator.
    Aborted,
}

impl ExecutionState {
    /// Returns true once the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }

    /// Returns true if the state is a terminal success.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionState::Succeeded)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Running => write!(f, "RUNNING"),
            ExecutionState::Succeeded => write!(f, "SUCCEEDED"),
            ExecutionState::Failed => write!(f, "FAILED"),
            ExecutionState::TimedOut => write!(f, "TIMED_OUT"),
            ExecutionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Reference to one execution attempt of a named workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// Engine-assigned execution identifier (opaque).
    pub execution_id: String,

    /// Name of the workflow definition the execution belongs to.
    pub workflow: String,
}

impl ExecutionHandle {
    pub fn new(execution_id: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow: workflow.into(),
        }
    }
}

impl std::fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.execution_id, self.workflow)
    }
}

/// Error detail reported for a failed execution or function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Remote error kind (e.g. "States.TaskFailed").
    pub kind: String,

    /// Human-readable message.
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Snapshot of an execution attempt returned by `describe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDescription {
    pub handle: ExecutionHandle,

    pub state: ExecutionState,

    /// Input the execution was started with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Output document, present once the execution succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Error detail, present once the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl ExecutionDescription {
    /// Description of a still-running execution.
    pub fn running(handle: ExecutionHandle) -> Self {
        Self {
            handle,
            state: ExecutionState::Running,
            input: None,
            output: None,
            error: None,
            started_at: None,
            stopped_at: None,
        }
    }
}

/// Persistent record grouping all execution attempts of one logical run.
///
/// `executions` is append-only and ordered by start: the last element is the
/// current attempt, whatever timestamps the engine reports for the attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,

    #[serde(default)]
    pub executions: Vec<ExecutionHandle>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create an empty record.
    pub fn new(run_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            executions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The most recently appended execution attempt.
    pub fn latest(&self) -> Option<&ExecutionHandle> {
        self.executions.last()
    }

    /// Append an attempt. Records are never edited or truncated otherwise.
    pub fn push(&mut self, handle: ExecutionHandle) {
        self.executions.push(handle);
        self.updated_at = Utc::now();
    }
}
