//! Persistent state store collaborator.
//!
//! The store keeps one [`RunRecord`] per logical run identifier. Records are
//! only ever extended through [`StateStore::append_execution`], which must be
//! atomic on the store side so concurrent launchers cannot lose attempts.

mod http;
mod memory;

pub use self::http::HttpStateStore;
pub use self::memory::InMemoryStateStore;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{ExecutionHandle, RunRecord};

/// Key/value access to run records.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the record for `run_id`, or `None` if there is none.
    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, RemoteError>;

    /// Atomically append an execution attempt, creating the record if needed.
    async fn append_execution(
        &self,
        run_id: &str,
        handle: &ExecutionHandle,
    ) -> Result<(), RemoteError>;
}

/// Reads and appends run records on behalf of the launcher and resolver.
#[derive(Clone)]
pub struct StateRecordAccessor {
    store: std::sync::Arc<dyn StateStore>,
}

impl StateRecordAccessor {
    pub fn new(store: std::sync::Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Fetch a run record.
    pub async fn record(&self, run_id: &str) -> Result<Option<RunRecord>, RemoteError> {
        self.store.get(run_id).await
    }

    /// Ordered execution history for a run; empty when the run is unknown.
    pub async fn history(&self, run_id: &str) -> Result<Vec<ExecutionHandle>, RemoteError> {
        Ok(self
            .store
            .get(run_id)
            .await?
            .map(|record| record.executions)
            .unwrap_or_default())
    }

    /// Link a freshly started execution to its run.
    pub async fn link(&self, run_id: &str, handle: &ExecutionHandle) -> Result<(), RemoteError> {
        tracing::debug!(
            run_id,
            execution_id = %handle.execution_id,
            "Appending execution to run record"
        );
        self.store.append_execution(run_id, handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_history_preserves_append_order() {
        let accessor = StateRecordAccessor::new(Arc::new(InMemoryStateStore::new()));

        tokio_test::block_on(async {
            for id in ["exec-a", "exec-b", "exec-c"] {
                accessor
                    .link("item-42", &ExecutionHandle::new(id, "wf"))
                    .await
                    .unwrap();
            }

            let history: Vec<_> = accessor
                .history("item-42")
                .await
                .unwrap()
                .into_iter()
                .map(|h| h.execution_id)
                .collect();
            assert_eq!(history, vec!["exec-a", "exec-b", "exec-c"]);

            assert!(accessor.history("unknown").await.unwrap().is_empty());
            assert!(accessor.record("unknown").await.unwrap().is_none());
        });
    }
}
