//! Typed client for the clinic REST API.
//!
//! The backend authenticates by a token path segment; the client also sends
//! it as a bearer header. Mutations answer with [`ApiReply`] so callers can
//! show the server's message either way.

mod appointments;
mod doctors;
mod patients;

use anyhow::{Context, Result, anyhow};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::warn;
use url::Url;

pub use appointments::{Appointment, Booking, PatientSummary};
pub use doctors::{Doctor, DoctorForm};
pub use patients::{Patient, PatientSignup};

use crate::config::Config;
use crate::http::{body_message, build_client, read_json_body};
use crate::login::EndpointResolver;

pub const MISSING_TOKEN_MESSAGE: &str = "Missing authentication token.";

/// Outcome of a mutating API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub success: bool,
    pub message: String,
}

impl ApiReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Builds a reply from a response: success needs a 2xx status and a body
    /// that does not say `"success": false`. The body's message wins over the
    /// defaults.
    pub fn from_response(status: StatusCode, body: &Value, ok: &str, failed: &str) -> Self {
        let success =
            status.is_success() && body.get("success").and_then(Value::as_bool) != Some(false);
        let fallback = if success { ok } else { failed };
        let message = body_message(body).unwrap_or_else(|| fallback.to_string());
        Self { success, message }
    }
}

/// Default messages for a mutation.
struct ReplyText {
    ok: &'static str,
    failed: &'static str,
    network: &'static str,
}

#[derive(Debug, Clone)]
pub struct ClinicClient {
    http: reqwest::Client,
    endpoints: EndpointResolver,
}

impl ClinicClient {
    pub fn new(http: reqwest::Client, endpoints: EndpointResolver) -> Self {
        Self { http, endpoints }
    }

    /// # Errors
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            build_client(config.request_timeout())?,
            EndpointResolver::from_config(config)?,
        ))
    }

    /// Builds `{base}/seg1/seg2/...`, percent-encoding each segment.
    fn route(&self, segments: &[&str]) -> Result<Url> {
        let base = self.endpoints.api_url("");
        let mut url = Url::parse(&base).with_context(|| format!("Invalid API base URL: {base}"))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("API base URL cannot take a path: {base}"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a mutation and folds every outcome into an [`ApiReply`].
    async fn send_for_reply(&self, request: RequestBuilder, text: &ReplyText) -> ApiReply {
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let body = read_json_body(response).await;
                ApiReply::from_response(status, &body, text.ok, text.failed)
            }
            Err(err) => {
                warn!(error = %err, "request failed");
                ApiReply::failure(text.network)
            }
        }
    }
}

/// Extracts a list from either a bare array or `{ <field>: [...] }`.
fn list_field(body: &Value, field: &str) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        _ => body
            .get(field)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}
