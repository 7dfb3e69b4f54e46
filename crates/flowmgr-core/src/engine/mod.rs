//! Workflow engine collaborator.
//!
//! The engine only receives start requests and reports execution status;
//! step logic lives entirely on the remote side.

mod http;
mod memory;

pub use self::http::HttpWorkflowEngine;
pub use self::memory::{InMemoryWorkflowEngine, Script};

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{ExecutionDescription, ExecutionHandle};

/// Remote state-machine workflow engine.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Start an execution of `workflow` with `input`.
    async fn start(
        &self,
        workflow: &str,
        input: &serde_json::Value,
    ) -> Result<ExecutionHandle, RemoteError>;

    /// Report the current state of an execution.
    async fn describe(&self, handle: &ExecutionHandle) -> Result<ExecutionDescription, RemoteError>;
}
