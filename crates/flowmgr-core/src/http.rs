//! Shared plumbing for the HTTP collaborators.

use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::error::RemoteError;

/// Build a reqwest client with a per-request timeout.
pub(crate) fn build_client(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .unwrap_or_default()
}

/// Join path segments onto a base URL, percent-encoding each segment.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| RemoteError::Transport(format!("Invalid base URL {}: {}", base_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| RemoteError::Transport(format!("Base URL cannot hold a path: {}", base_url)))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// Turn a non-success response into a [`RemoteError`].
pub(crate) async fn error_for(response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, body)
}

fn classify(status: StatusCode, body: String) -> RemoteError {
    let detail = format!("Status {}: {}", status, body);
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        s if s.is_client_error() => RemoteError::Rejected(detail),
        _ => RemoteError::Transport(detail),
    }
}

/// Decode a JSON document that travels as a string.
pub(crate) fn decode_document(
    field: &str,
    raw: Option<String>,
) -> Result<Option<serde_json::Value>, RemoteError> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RemoteError::Malformed(format!("{} is not valid JSON: {}", field, e))),
    }
}
