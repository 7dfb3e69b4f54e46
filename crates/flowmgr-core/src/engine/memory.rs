//! In-memory workflow engine.
//!
//! Executions follow scripted state sequences, which makes it useful for
//! tests and dry runs. Unscripted executions stay `RUNNING` forever.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::WorkflowEngine;
use crate::error::RemoteError;
use crate::types::{ErrorDetail, ExecutionDescription, ExecutionHandle, ExecutionState};

/// Sequence of states reported by successive `describe` calls.
///
/// Each call consumes one state; the last one sticks.
#[derive(Debug, Clone, Default)]
pub struct Script {
    states: VecDeque<ExecutionState>,
    output: Option<serde_json::Value>,
    error: Option<ErrorDetail>,
}

impl Script {
    /// Report `RUNNING` for `checks` calls, then `terminal`.
    pub fn running_then(checks: usize, terminal: ExecutionState) -> Self {
        let mut states: VecDeque<_> = std::iter::repeat(ExecutionState::Running)
            .take(checks)
            .collect();
        states.push_back(terminal);
        Self {
            states,
            ..Self::default()
        }
    }

    /// Report `RUNNING` on every call.
    pub fn running() -> Self {
        Self::running_then(0, ExecutionState::Running)
    }

    /// Output attached once the execution succeeds.
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Error attached once the execution fails.
    pub fn with_error(mut self, error: ErrorDetail) -> Self {
        self.error = Some(error);
        self
    }

    fn next_state(&mut self) -> ExecutionState {
        if self.states.len() > 1 {
            self.states.pop_front().unwrap_or(ExecutionState::Running)
        } else {
            self.states.front().copied().unwrap_or(ExecutionState::Running)
        }
    }
}

struct ScriptedExecution {
    description: ExecutionDescription,
    script: Script,
    describes: usize,
}

#[derive(Default)]
struct EngineState {
    next_id: u64,
    executions: HashMap<String, ScriptedExecution>,
    pending_scripts: VecDeque<Script>,
    reject_reason: Option<String>,
    starts: usize,
}

/// Workflow engine backed by a HashMap.
#[derive(Clone, Default)]
pub struct InMemoryWorkflowEngine {
    state: Arc<Mutex<EngineState>>,
}

impl InMemoryWorkflowEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script applied to the next started execution. Queued in order.
    pub fn script_next_start(&self, script: Script) {
        self.lock().pending_scripts.push_back(script);
    }

    /// Replace the script of an existing execution.
    pub fn script(&self, execution_id: &str, script: Script) {
        if let Some(execution) = self.lock().executions.get_mut(execution_id) {
            execution.script = script;
        }
    }

    /// Reject every subsequent start with `reason`.
    pub fn reject_starts(&self, reason: impl Into<String>) {
        self.lock().reject_reason = Some(reason.into());
    }

    /// Number of start calls that reached the engine, rejected ones included.
    pub fn start_count(&self) -> usize {
        self.lock().starts
    }

    /// Number of describe calls made for an execution.
    pub fn describe_count(&self, execution_id: &str) -> usize {
        self.lock()
            .executions
            .get(execution_id)
            .map(|e| e.describes)
            .unwrap_or(0)
    }

    /// Register an execution directly, bypassing `start`.
    pub fn insert(&self, handle: ExecutionHandle, input: serde_json::Value, script: Script) {
        let mut description = ExecutionDescription::running(handle.clone());
        description.input = Some(input);
        description.started_at = Some(Utc::now());
        self.lock().executions.insert(
            handle.execution_id,
            ScriptedExecution {
                description,
                script,
                describes: 0,
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn start(
        &self,
        workflow: &str,
        input: &serde_json::Value,
    ) -> Result<ExecutionHandle, RemoteError> {
        let (handle, script) = {
            let mut state = self.lock();
            state.starts += 1;

            if let Some(reason) = &state.reject_reason {
                return Err(RemoteError::Rejected(reason.clone()));
            }
            if workflow.trim().is_empty() {
                return Err(RemoteError::Rejected("workflow name is empty".to_string()));
            }

            state.next_id += 1;
            let handle = ExecutionHandle::new(format!("{}:{}", workflow, state.next_id), workflow);
            let script = state.pending_scripts.pop_front().unwrap_or_else(Script::running);
            (handle, script)
        };

        self.insert(handle.clone(), input.clone(), script);
        Ok(handle)
    }

    async fn describe(&self, handle: &ExecutionHandle) -> Result<ExecutionDescription, RemoteError> {
        let mut state = self.lock();
        let execution = state
            .executions
            .get_mut(&handle.execution_id)
            .ok_or_else(|| RemoteError::NotFound(handle.execution_id.clone()))?;

        execution.describes += 1;
        if execution.description.state.is_terminal() {
            return Ok(execution.description.clone());
        }

        let next = execution.script.next_state();
        execution.description.state = next;
        match next {
            ExecutionState::Running => {}
            ExecutionState::Succeeded => {
                execution.description.output = execution.script.output.clone();
                execution.description.stopped_at = Some(Utc::now());
            }
            _ => {
                execution.description.error = execution.script.error.clone();
                execution.description.stopped_at = Some(Utc::now());
            }
        }

        Ok(execution.description.clone())
    }
}
