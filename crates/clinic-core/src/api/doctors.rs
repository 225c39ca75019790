use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ApiReply, ClinicClient, MISSING_TOKEN_MESSAGE, ReplyText, list_field};
use crate::http::read_json_body;

const SAVE_TEXT: ReplyText = ReplyText {
    ok: "Doctor saved successfully.",
    failed: "Failed to save doctor.",
    network: "Network or server error while saving doctor.",
};

const DELETE_TEXT: ReplyText = ReplyText {
    ok: "Doctor deleted successfully.",
    failed: "Failed to delete doctor.",
    network: "Network or server error while deleting doctor.",
};

/// Placeholder the filter route expects for an unset criterion.
const FILTER_ANY: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub available_times: Vec<String>,
}

/// New doctor as entered by an admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorForm {
    pub name: String,
    pub specialty: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    /// Slots like `09:00-10:00`.
    pub available_times: Vec<String>,
}

impl DoctorForm {
    /// Trims the text fields and checks that none is empty.
    ///
    /// # Errors
    /// Returns the message to show when a required field is missing.
    pub fn validate(mut self) -> Result<Self, String> {
        for field in [
            &mut self.name,
            &mut self.specialty,
            &mut self.email,
            &mut self.password,
            &mut self.phone,
        ] {
            *field = field.trim().to_string();
            if field.is_empty() {
                return Err("Please fill in all required fields.".to_string());
            }
        }
        Ok(self)
    }
}

fn filter_segment(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() { FILTER_ANY } else { value }
}

impl ClinicClient {
    /// Lists all doctors. Any failure yields an empty list.
    pub async fn list_doctors(&self) -> Vec<Doctor> {
        match self.fetch_doctors(&["doctor"]).await {
            Ok(doctors) => doctors,
            Err(err) => {
                warn!(error = ?err, "failed to list doctors");
                Vec::new()
            }
        }
    }

    /// Filters doctors by name, time of day and specialty. Blank criteria
    /// match everything.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects it.
    pub async fn filter_doctors(
        &self,
        name: &str,
        time: &str,
        specialty: &str,
    ) -> Result<Vec<Doctor>> {
        self.fetch_doctors(&[
            "doctor",
            "filter",
            filter_segment(name),
            filter_segment(time),
            filter_segment(specialty),
        ])
        .await
        .context("Failed to filter doctors. Please try again.")
    }

    async fn fetch_doctors(&self, segments: &[&str]) -> Result<Vec<Doctor>> {
        let url = self.route(segments)?;
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach the clinic server")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Doctor request failed (HTTP {status})");
        }

        let body = read_json_body(response).await;
        let doctors = list_field(&body, "doctors")
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        Ok(doctors)
    }

    /// Creates a doctor. Requires an admin token.
    pub async fn save_doctor(&self, doctor: &DoctorForm, token: &str) -> ApiReply {
        if token.is_empty() {
            return ApiReply::failure(MISSING_TOKEN_MESSAGE);
        }
        let url = match self.route(&["doctor", token]) {
            Ok(url) => url,
            Err(err) => return ApiReply::failure(err.to_string()),
        };

        let request = self.http.post(url).bearer_auth(token).json(doctor);
        self.send_for_reply(request, &SAVE_TEXT).await
    }

    /// Validates the form and the admin session before saving.
    pub async fn add_doctor(&self, form: DoctorForm, token: Option<&str>) -> ApiReply {
        let form = match form.validate() {
            Ok(form) => form,
            Err(message) => return ApiReply::failure(message),
        };
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return ApiReply::failure("You must be logged in as admin to add a doctor.");
        };
        self.save_doctor(&form, token).await
    }

    /// Deletes a doctor by id. Requires an admin token.
    pub async fn delete_doctor(&self, id: i64, token: &str) -> ApiReply {
        if id <= 0 {
            return ApiReply::failure("Invalid doctor id.");
        }
        if token.is_empty() {
            return ApiReply::failure(MISSING_TOKEN_MESSAGE);
        }
        let id = id.to_string();
        let url = match self.route(&["doctor", &id, token]) {
            Ok(url) => url,
            Err(err) => return ApiReply::failure(err.to_string()),
        };

        let request = self.http.delete(url).bearer_auth(token);
        self.send_for_reply(request, &DELETE_TEXT).await
    }
}
