//! Execution launcher.

use std::sync::Arc;

use crate::engine::WorkflowEngine;
use crate::error::{Error, Result};
use crate::payload::PayloadValidator;
use crate::state::StateRecordAccessor;
use crate::types::ExecutionHandle;

/// Request to start a workflow execution.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Workflow definition name.
    pub workflow: String,

    /// Input payload.
    pub input: serde_json::Value,

    /// Logical run the attempt belongs to, if any.
    pub run_id: Option<String>,

    /// Derive a fresh run id so a finished run can be executed again
    /// without touching its record. Requires `run_id`.
    pub force: bool,
}

impl LaunchRequest {
    pub fn new(workflow: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            workflow: workflow.into(),
            input,
            run_id: None,
            force: false,
        }
    }

    /// Attach the attempt to a logical run.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Force a fresh logical run.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    fn effective_run_id(&self) -> Option<String> {
        self.run_id.as_ref().map(|run_id| {
            if self.force {
                forced_run_id(run_id)
            } else {
                run_id.clone()
            }
        })
    }
}

/// Fresh run id derived from `run_id` for a forced re-run.
pub fn forced_run_id(run_id: &str) -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    format!("{}_force-{}", run_id, nanos)
}

/// A started execution and the run it was recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct Launched {
    pub handle: ExecutionHandle,
    pub run_id: Option<String>,
}

/// Starts workflow executions and links them to their run record.
#[derive(Clone)]
pub struct ExecutionLauncher {
    engine: Arc<dyn WorkflowEngine>,
    records: StateRecordAccessor,
    validator: PayloadValidator,
}

impl ExecutionLauncher {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        records: StateRecordAccessor,
        validator: PayloadValidator,
    ) -> Self {
        Self {
            engine,
            records,
            validator,
        }
    }

    /// Validate the payload, start the execution and append it to the run
    /// record.
    pub async fn launch(&self, request: &LaunchRequest) -> Result<Launched> {
        if request.force && request.run_id.is_none() {
            return Err(Error::InvalidPayload(
                "force requires a run id to derive a fresh one from".to_string(),
            ));
        }
        self.validator.validate(&request.input)?;

        let run_id = request.effective_run_id();
        tracing::info!(
            workflow = %request.workflow,
            run_id = ?run_id,
            "Starting execution"
        );

        let handle = self
            .engine
            .start(&request.workflow, &request.input)
            .await
            .map_err(|e| Error::Launch(format!("{}: {}", request.workflow, e)))?;

        tracing::info!(
            workflow = %handle.workflow,
            execution_id = %handle.execution_id,
            "Execution started"
        );

        if let Some(run_id) = &run_id {
            if let Err(e) = self.records.link(run_id, &handle).await {
                tracing::error!(
                    run_id = %run_id,
                    execution_id = %handle.execution_id,
                    error = %e,
                    "Execution started but could not be recorded"
                );
                return Err(Error::Unrecorded {
                    run_id: run_id.clone(),
                    handle,
                    reason: e.to_string(),
                });
            }
        }

        Ok(Launched { handle, run_id })
    }
}
