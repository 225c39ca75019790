use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiReply, ClinicClient, MISSING_TOKEN_MESSAGE, ReplyText, list_field};
use crate::http::{body_message, read_json_body};

const BOOK_TEXT: ReplyText = ReplyText {
    ok: "Appointment booked successfully.",
    failed: "Failed to book appointment.",
    network: "Network or server error while booking appointment.",
};

/// Name segment meaning "any patient".
const ANY_PATIENT: &str = "null";

/// Patient fields shown next to an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Appointment as listed for a doctor.
///
/// Older backends inline the patient fields on the appointment instead of
/// nesting a `patient` object; both shapes are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub patient: Option<PatientSummary>,
    #[serde(default)]
    patient_id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl Appointment {
    /// Patient details, preferring the nested object over inlined fields.
    pub fn patient_view(&self) -> PatientSummary {
        let nested = self.patient.clone().unwrap_or_default();
        PatientSummary {
            id: nested.id.or(self.patient_id),
            name: nested.name.or_else(|| self.name.clone()),
            phone: nested.phone.or_else(|| self.phone.clone()),
            email: nested.email.or_else(|| self.email.clone()),
        }
    }
}

/// Appointment request made by a logged-in patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub doctor_id: i64,
    pub patient_id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
    /// A slot such as `09:00-10:00`, or a bare start time.
    pub slot: String,
}

impl Booking {
    /// Request body: the slot's start time becomes `appointmentTime`.
    pub fn payload(&self) -> Value {
        let start = self.slot.split('-').next().unwrap_or_default().trim();
        json!({
            "doctor": { "id": self.doctor_id },
            "patient": { "id": self.patient_id },
            "appointmentTime": format!("{}T{start}:00", self.date),
            "status": 0,
        })
    }
}

impl ClinicClient {
    /// Lists a doctor's appointments for `date`, optionally filtered by
    /// patient name.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects it.
    pub async fn list_appointments(
        &self,
        date: &str,
        patient_name: Option<&str>,
        token: &str,
    ) -> Result<Vec<Appointment>> {
        if token.is_empty() {
            bail!(MISSING_TOKEN_MESSAGE);
        }
        let name = patient_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANY_PATIENT);

        let url = self.route(&["appointments", date, name, token])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Error loading appointments. Try again later.")?;

        let status = response.status();
        let body = read_json_body(response).await;
        if !status.is_success() {
            match body_message(&body) {
                Some(message) => bail!("{message}"),
                None => bail!("Error loading appointments (HTTP {status})"),
            }
        }

        Ok(list_field(&body, "appointments")
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }

    /// Books an appointment for the logged-in patient.
    pub async fn book_appointment(&self, booking: &Booking, token: &str) -> ApiReply {
        if token.is_empty() {
            return ApiReply::failure(MISSING_TOKEN_MESSAGE);
        }
        let url = match self.route(&["appointments", token]) {
            Ok(url) => url,
            Err(err) => return ApiReply::failure(err.to_string()),
        };

        let request = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&booking.payload());
        self.send_for_reply(request, &BOOK_TEXT).await
    }
}
