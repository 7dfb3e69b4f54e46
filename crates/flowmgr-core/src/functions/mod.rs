//! Remote function collaborator and the direct invocation path.

mod http;
mod memory;

pub use self::http::{HttpFunctionService, FUNCTION_ERROR_HEADER};
pub use self::memory::InMemoryFunctionService;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, RemoteError, Result};
use crate::outcome::{FailureSource, InvocationResult};
use crate::types::ErrorDetail;

/// Response of a synchronous function invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionResponse {
    /// The function returned a value.
    Returned(serde_json::Value),
    /// The function raised an error.
    Raised(ErrorDetail),
}

/// Remote function service. Invocation blocks until the function finishes.
#[async_trait]
pub trait FunctionService: Send + Sync {
    async fn invoke(
        &self,
        function: &str,
        input: &serde_json::Value,
    ) -> std::result::Result<FunctionResponse, RemoteError>;
}

/// Invokes a single remote function, bypassing the workflow engine.
#[derive(Clone)]
pub struct FunctionInvoker {
    service: Arc<dyn FunctionService>,
}

impl FunctionInvoker {
    pub fn new(service: Arc<dyn FunctionService>) -> Self {
        Self { service }
    }

    /// Invoke `function` and relay its result.
    ///
    /// A raised remote error is a failed outcome. A refused or unknown
    /// function is a launch error.
    pub async fn invoke(&self, function: &str, input: &serde_json::Value) -> Result<InvocationResult> {
        if function.trim().is_empty() {
            return Err(Error::Launch("function name is empty".to_string()));
        }

        let start = Instant::now();
        tracing::info!(function, "Invoking function");

        let response = self.service.invoke(function, input).await.map_err(|e| match e {
            RemoteError::Rejected(msg) | RemoteError::NotFound(msg) => {
                Error::Launch(format!("{}: {}", function, msg))
            }
            other => Error::Remote(other),
        })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match response {
            FunctionResponse::Returned(output) => {
                tracing::info!(function, elapsed_ms, "Function returned");
                Ok(InvocationResult::success(output))
            }
            FunctionResponse::Raised(error) => {
                tracing::warn!(function, elapsed_ms, kind = %error.kind, "Function raised");
                Ok(InvocationResult::failure(FailureSource::Function, error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoker() -> FunctionInvoker {
        let service = InMemoryFunctionService::new();
        service.register("echo", |input| FunctionResponse::Returned(input));
        service.register("explode", |_| {
            FunctionResponse::Raised(ErrorDetail::new("ValueError", "bad input"))
        });
        FunctionInvoker::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_invoke_returns_output() {
        let result = invoker().invoke("echo", &json!({"a": 1})).await.unwrap();
        assert_eq!(result.output(), Some(&json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_invoke_raised_is_failure_outcome() {
        let result = invoker().invoke("explode", &json!({})).await.unwrap();
        match result {
            InvocationResult::Failure { source, error, .. } => {
                assert_eq!(source, FailureSource::Function);
                assert_eq!(error.kind, "ValueError");
            }
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_invoke_unknown_function_is_launch_error() {
        let err = invoker().invoke("missing", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }

    #[tokio::test]
    async fn test_invoke_empty_name() {
        let err = invoker().invoke("  ", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }
}
