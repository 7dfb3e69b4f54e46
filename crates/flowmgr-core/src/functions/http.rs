//! HTTP function service client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{FunctionResponse, FunctionService};
use crate::error::RemoteError;
use crate::http::{build_client, endpoint, error_for};
use crate::types::ErrorDetail;

/// Header set by the service when the function raised.
pub const FUNCTION_ERROR_HEADER: &str = "x-function-error";

/// Body returned for a raised function error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RaisedBody {
    #[serde(default)]
    error_type: Option<String>,

    #[serde(default)]
    error_message: Option<String>,
}

/// HTTP client for a function invocation API.
#[derive(Clone)]
pub struct HttpFunctionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFunctionService {
    /// Create a new function service client.
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            client: build_client(request_timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FunctionService for HttpFunctionService {
    async fn invoke(
        &self,
        function: &str,
        input: &serde_json::Value,
    ) -> Result<FunctionResponse, RemoteError> {
        let url = endpoint(&self.base_url, &["functions", function, "invocations"])?;

        let response = self.client.post(url).json(input).send().await?;

        if !response.status().is_success() {
            return Err(error_for(response).await);
        }

        let raised_kind = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.bytes().await?;
        parse_response(raised_kind, &body)
    }
}

fn parse_response(raised_kind: Option<String>, body: &[u8]) -> Result<FunctionResponse, RemoteError> {
    if let Some(header_kind) = raised_kind {
        let raised: RaisedBody = serde_json::from_slice(body).unwrap_or(RaisedBody {
            error_type: None,
            error_message: Some(String::from_utf8_lossy(body).into_owned()),
        });
        return Ok(FunctionResponse::Raised(ErrorDetail::new(
            raised.error_type.unwrap_or(header_kind),
            raised.error_message.unwrap_or_default(),
        )));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FunctionResponse::Returned(serde_json::Value::Null));
    }

    Ok(FunctionResponse::Returned(serde_json::from_slice(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_returned() {
        let response = parse_response(None, b"{\"id\": 1}").unwrap();
        assert_eq!(response, FunctionResponse::Returned(json!({"id": 1})));

        let response = parse_response(None, b"").unwrap();
        assert_eq!(response, FunctionResponse::Returned(serde_json::Value::Null));
    }

    #[test]
    fn test_parse_raised() {
        let body = br#"{"errorType": "KeyError", "errorMessage": "'id'"}"#;
        let response = parse_response(Some("Unhandled".to_string()), body).unwrap();
        assert_eq!(
            response,
            FunctionResponse::Raised(ErrorDetail::new("KeyError", "'id'"))
        );
    }

    #[test]
    fn test_parse_raised_with_plain_body() {
        let response = parse_response(Some("Unhandled".to_string()), b"it broke").unwrap();
        assert_eq!(
            response,
            FunctionResponse::Raised(ErrorDetail::new("Unhandled", "it broke"))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_response(None, b"{nope"),
            Err(RemoteError::Malformed(_))
        ));
    }
}
