use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::{ApiReply, ClinicClient, MISSING_TOKEN_MESSAGE, ReplyText};
use crate::http::{body_message, read_json_body};

const SIGNUP_TEXT: ReplyText = ReplyText {
    ok: "Signup successful",
    failed: "Signup failed.",
    network: "An error occurred while signing up.",
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientSignup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Patient {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl ClinicClient {
    /// Registers a new patient account.
    pub async fn signup_patient(&self, signup: &PatientSignup) -> ApiReply {
        let url = match self.route(&["patient"]) {
            Ok(url) => url,
            Err(err) => return ApiReply::failure(err.to_string()),
        };

        let request = self.http.post(url).json(signup);
        self.send_for_reply(request, &SIGNUP_TEXT).await
    }

    /// Fetches the patient owning `token`.
    ///
    /// # Errors
    /// Returns an error if the request fails, the token is rejected or the
    /// body holds no patient.
    pub async fn patient_details(&self, token: &str) -> Result<Patient> {
        if token.is_empty() {
            bail!(MISSING_TOKEN_MESSAGE);
        }

        let url = self.route(&["patient", token])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach the clinic server")?;

        let status = response.status();
        let mut body = read_json_body(response).await;
        if !status.is_success() {
            match body_message(&body) {
                Some(message) => bail!("{message}"),
                None => bail!("Failed to load patient details (HTTP {status})"),
            }
        }

        let patient = match body.get_mut("patient") {
            Some(nested) => nested.take(),
            None => body,
        };
        serde_json::from_value(patient).context("Failed to parse patient details")
    }
}
