//! HTTP state store client.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use super::StateStore;
use crate::error::RemoteError;
use crate::http::{build_client, endpoint, error_for};
use crate::types::{ExecutionHandle, RunRecord};

/// HTTP client for a run-record store.
///
/// Appends go through `POST /runs/{id}/executions`, which the server applies
/// as a single atomic list append.
#[derive(Clone)]
pub struct HttpStateStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStateStore {
    /// Create a new store client.
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            client: build_client(request_timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StateStore for HttpStateStore {
    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, RemoteError> {
        let url = endpoint(&self.base_url, &["runs", run_id])?;

        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        let record: RunRecord = response.json().await?;
        Ok(Some(record))
    }

    async fn append_execution(
        &self,
        run_id: &str,
        handle: &ExecutionHandle,
    ) -> Result<(), RemoteError> {
        let url = endpoint(&self.base_url, &["runs", run_id, "executions"])?;

        let response = self.client.post(url).json(handle).send().await?;

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        Ok(())
    }
}
