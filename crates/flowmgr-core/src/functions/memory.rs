//! In-memory function service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{FunctionResponse, FunctionService};
use crate::error::RemoteError;

type Handler = Arc<dyn Fn(serde_json::Value) -> FunctionResponse + Send + Sync>;

/// Function service dispatching to registered closures.
#[derive(Clone, Default)]
pub struct InMemoryFunctionService {
    functions: Arc<RwLock<HashMap<String, Handler>>>,
}

impl InMemoryFunctionService {
    /// Create a service with no functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Replaces an existing one with the same name.
    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(serde_json::Value) -> FunctionResponse + Send + Sync + 'static,
    {
        if let Ok(mut functions) = self.functions.write() {
            functions.insert(name.to_string(), Arc::new(handler));
        }
    }

    /// Check if a function is registered.
    pub fn has(&self, name: &str) -> bool {
        self.functions
            .read()
            .map(|functions| functions.contains_key(name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FunctionService for InMemoryFunctionService {
    async fn invoke(
        &self,
        function: &str,
        input: &serde_json::Value,
    ) -> Result<FunctionResponse, RemoteError> {
        let handler = {
            let functions = self
                .functions
                .read()
                .map_err(|e| RemoteError::Transport(format!("Lock error: {}", e)))?;
            functions
                .get(function)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(format!("Function not found: {}", function)))?
        };

        Ok(handler(input.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_invoke() {
        let service = InMemoryFunctionService::new();
        service.register("double", |input| {
            let n = input.as_i64().unwrap_or_default();
            FunctionResponse::Returned(json!(n * 2))
        });

        assert!(service.has("double"));
        assert!(!service.has("triple"));

        let response = service.invoke("double", &json!(21)).await.unwrap();
        assert_eq!(response, FunctionResponse::Returned(json!(42)));
    }
}
