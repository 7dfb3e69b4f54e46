//! Latest-execution resolver.
//!
//! Attempts are appended to a run record in the order the launcher starts
//! them, so the current attempt is the last entry. Engine timestamps are not
//! compared: clocks of concurrent starts can disagree.

use crate::error::{Error, Result};
use crate::state::StateRecordAccessor;
use crate::types::ExecutionHandle;

/// Picks the current execution attempt of a logical run.
#[derive(Clone)]
pub struct LatestExecutionResolver {
    records: StateRecordAccessor,
}

impl LatestExecutionResolver {
    pub fn new(records: StateRecordAccessor) -> Self {
        Self { records }
    }

    /// Resolve the most recently appended attempt for `run_id`.
    ///
    /// Fails with [`Error::UnknownRun`] if the run has no record or the
    /// record holds no attempts.
    pub async fn resolve(&self, run_id: &str) -> Result<ExecutionHandle> {
        let record = self
            .records
            .record(run_id)
            .await?
            .ok_or_else(|| Error::UnknownRun(run_id.to_string()))?;

        let latest = record
            .latest()
            .cloned()
            .ok_or_else(|| Error::UnknownRun(format!("{} has no recorded executions", run_id)))?;

        tracing::debug!(
            run_id,
            execution_id = %latest.execution_id,
            attempts = record.executions.len(),
            "Resolved latest execution"
        );

        Ok(latest)
    }
}
