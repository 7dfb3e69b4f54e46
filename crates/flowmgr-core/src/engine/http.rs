//! HTTP workflow engine client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::WorkflowEngine;
use crate::error::RemoteError;
use crate::http::{build_client, decode_document, endpoint, error_for};
use crate::types::{ErrorDetail, ExecutionDescription, ExecutionHandle, ExecutionState};

/// Response to a start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub execution_id: String,
}

/// Execution description as it travels on the wire.
///
/// `input` and `output` are JSON documents encoded as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub execution_id: String,

    #[serde(default)]
    pub workflow: Option<String>,

    pub state: ExecutionState,

    #[serde(default)]
    pub input: Option<String>,

    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub error: Option<ErrorDetail>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl DescribeResponse {
    fn into_description(self, handle: &ExecutionHandle) -> Result<ExecutionDescription, RemoteError> {
        if self.execution_id != handle.execution_id {
            return Err(RemoteError::Malformed(format!(
                "Asked for execution {} but engine described {}",
                handle.execution_id, self.execution_id
            )));
        }

        Ok(ExecutionDescription {
            handle: ExecutionHandle::new(
                self.execution_id,
                self.workflow.unwrap_or_else(|| handle.workflow.clone()),
            ),
            state: self.state,
            input: decode_document("input", self.input)?,
            output: decode_document("output", self.output)?,
            error: self.error,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
        })
    }
}

/// HTTP client for a workflow engine API.
#[derive(Clone)]
pub struct HttpWorkflowEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowEngine {
    /// Create a new engine client.
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            client: build_client(request_timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn start(
        &self,
        workflow: &str,
        input: &serde_json::Value,
    ) -> Result<ExecutionHandle, RemoteError> {
        let url = endpoint(&self.base_url, &["workflows", workflow, "executions"])?;

        let response = self.client.post(url).json(input).send().await?;

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        let started: StartResponse = response.json().await?;
        Ok(ExecutionHandle::new(started.execution_id, workflow))
    }

    async fn describe(&self, handle: &ExecutionHandle) -> Result<ExecutionDescription, RemoteError> {
        let url = endpoint(&self.base_url, &["executions", &handle.execution_id])?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        let described: DescribeResponse = response.json().await?;
        described.into_description(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let engine = HttpWorkflowEngine::new("http://localhost:8083/", Duration::from_secs(5));
        assert_eq!(engine.base_url, "http://localhost:8083");
    }

    #[test]
    fn test_describe_response_decoding() {
        let wire = json!({
            "execution_id": "exec-1",
            "state": "SUCCEEDED",
            "input": "{\"id\": \"item-42\"}",
            "output": "{\"id\": \"item-42\", \"done\": true}",
            "started_at": "2024-01-01T00:00:00Z"
        });
        let response: DescribeResponse = serde_json::from_value(wire).unwrap();
        let description = response
            .into_description(&ExecutionHandle::new("exec-1", "wf"))
            .unwrap();

        assert_eq!(description.state, ExecutionState::Succeeded);
        assert_eq!(description.handle.workflow, "wf");
        assert_eq!(description.output.unwrap()["done"], json!(true));
        assert!(description.started_at.is_some());
    }

    #[test]
    fn test_describe_response_malformed_output() {
        let wire = json!({
            "execution_id": "exec-1",
            "state": "SUCCEEDED",
            "output": "not json"
        });
        let response: DescribeResponse = serde_json::from_value(wire).unwrap();
        let err = response
            .into_description(&ExecutionHandle::new("exec-1", "wf"))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }

    #[test]
    fn test_describe_response_wrong_execution() {
        let wire = json!({"execution_id": "exec-2", "state": "RUNNING"});
        let response: DescribeResponse = serde_json::from_value(wire).unwrap();
        assert!(response
            .into_description(&ExecutionHandle::new("exec-1", "wf"))
            .is_err());
    }
}
