//! In-memory implementation of StateStore.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::StateStore;
use crate::error::RemoteError;
use crate::types::{ExecutionHandle, RunRecord};

/// State store that keeps run records in a HashMap.
///
/// Appends happen under a single write lock, so concurrent writers never
/// lose each other's attempts.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    records: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, replacing any existing one.
    pub fn insert(&self, record: RunRecord) -> Result<(), RemoteError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RemoteError::Transport(format!("Lock error: {}", e)))?;
        records.insert(record.run_id.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, RemoteError> {
        let records = self
            .records
            .read()
            .map_err(|e| RemoteError::Transport(format!("Lock error: {}", e)))?;
        Ok(records.get(run_id).cloned())
    }

    async fn append_execution(
        &self,
        run_id: &str,
        handle: &ExecutionHandle,
    ) -> Result<(), RemoteError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RemoteError::Transport(format!("Lock error: {}", e)))?;
        records
            .entry(run_id.to_string())
            .or_insert_with(|| RunRecord::new(run_id))
            .push(handle.clone());
        Ok(())
    }
}
