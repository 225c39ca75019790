//! HTTP plumbing shared by the login transport and the API client.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("clinic/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used for all backend calls.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Reads a response body as JSON. Empty or unparseable bodies become `{}`.
pub async fn read_json_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    parse_body(&text)
}

pub(crate) fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Returns the body's `message` field when it is a non-empty string.
pub fn body_message(body: &Value) -> Option<String> {
    non_empty_str(body, "message")
}

pub(crate) fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
