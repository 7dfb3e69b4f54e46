//! Outcome poller.
//!
//! Checks an execution until it reaches a terminal state, the deadline
//! passes, or the caller cancels. Cancelling only stops local polling; the
//! remote execution keeps running and can be polled again with the same
//! handle.

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{PollConfig, MIN_POLL_INTERVAL};
use crate::engine::WorkflowEngine;
use crate::error::{Error, RemoteError, Result};
use crate::outcome::InvocationResult;
use crate::types::ExecutionHandle;

/// Waits for executions to finish.
#[derive(Clone)]
pub struct OutcomePoller {
    engine: Arc<dyn WorkflowEngine>,
    config: PollConfig,
}

impl OutcomePoller {
    pub fn new(engine: Arc<dyn WorkflowEngine>, config: PollConfig) -> Self {
        Self { engine, config }
    }

    /// Poller settings.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll with the configured settings.
    pub async fn poll(
        &self,
        handle: &ExecutionHandle,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        self.poll_with(handle, &self.config, cancel).await
    }

    /// Poll with explicit settings.
    ///
    /// A reported execution failure is returned as a failed
    /// [`InvocationResult`], not as an error. [`Error::Timeout`] is only
    /// returned while the execution is still running.
    pub async fn poll_with(
        &self,
        handle: &ExecutionHandle,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        let start = Instant::now();
        let mut deadline = start + config.timeout;
        let mut extensions_left = config.timeout_extensions;
        let mut interval = config.interval.max(MIN_POLL_INTERVAL);
        let mut checks: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(handle));
            }

            let description = self.engine.describe(handle).await.map_err(|e| match e {
                RemoteError::NotFound(_) => {
                    Error::UnknownRun(format!("execution {} not found", handle.execution_id))
                }
                other => Error::Remote(other),
            })?;
            checks += 1;

            if let Some(result) = InvocationResult::from_description(&description) {
                tracing::info!(
                    execution_id = %handle.execution_id,
                    state = %description.state,
                    checks,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Execution reached terminal state"
                );
                return Ok(result);
            }

            let now = Instant::now();
            if now >= deadline {
                if extensions_left == 0 {
                    tracing::warn!(
                        execution_id = %handle.execution_id,
                        checks,
                        "Timed out waiting for execution"
                    );
                    return Err(Error::Timeout {
                        target: handle.execution_id.clone(),
                        handle: Some(handle.clone()),
                        waited: now.duration_since(start),
                    });
                }

                extensions_left -= 1;
                deadline = now + config.timeout;
                tracing::warn!(
                    execution_id = %handle.execution_id,
                    extensions_left,
                    "Execution still running at deadline, extending"
                );
            }

            let sleep_for = interval.min(deadline.saturating_duration_since(now));
            tracing::trace!(
                execution_id = %handle.execution_id,
                sleep_ms = sleep_for.as_millis() as u64,
                "Execution still running"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(handle)),
                _ = tokio::time::sleep(sleep_for) => {}
            }

            interval = config.next_interval(interval);
        }
    }
}

fn cancelled(handle: &ExecutionHandle) -> Error {
    tracing::info!(execution_id = %handle.execution_id, "Polling cancelled");
    Error::Cancelled {
        target: handle.execution_id.clone(),
        handle: Some(handle.clone()),
    }
}
