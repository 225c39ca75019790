//! Appointment command handlers.

use anyhow::{Context, Result};
use clinic_core::api::{Appointment, Booking, ClinicClient};
use clinic_core::config::Config;
use clinic_core::role::Role;
use comfy_table::Table;

use super::{authorize, report};

pub async fn list(config: &Config, date: Option<String>, patient: Option<&str>) -> Result<()> {
    let token = authorize(config, Role::Doctor)?;
    let client = ClinicClient::from_config(config)?;

    let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    let appointments = client.list_appointments(&date, patient, &token).await?;

    if appointments.is_empty() {
        println!("No appointments found for {date}.");
    } else {
        println!("{}", appointment_table(&appointments));
    }
    Ok(())
}

fn appointment_table(appointments: &[Appointment]) -> Table {
    let dash = || "-".to_string();
    let mut table = Table::new();
    table.set_header(["Patient ID", "Name", "Phone", "Email", "Time"]);
    for appointment in appointments {
        let patient = appointment.patient_view();
        table.add_row([
            patient.id.map_or_else(dash, |id| id.to_string()),
            patient.name.unwrap_or_else(dash),
            patient.phone.unwrap_or_else(dash),
            patient.email.unwrap_or_else(dash),
            appointment.appointment_time.clone().unwrap_or_else(dash),
        ]);
    }
    table
}

pub async fn book(
    config: &Config,
    doctor_id: i64,
    patient_id: Option<i64>,
    date: String,
    slot: String,
) -> Result<()> {
    let token = authorize(config, Role::LoggedPatient)?;
    let client = ClinicClient::from_config(config)?;

    let patient_id = match patient_id {
        Some(id) => id,
        None => client
            .patient_details(&token)
            .await
            .context("look up logged-in patient")?
            .id
            .context("Patient record has no id")?,
    };

    let booking = Booking {
        doctor_id,
        patient_id,
        date,
        slot,
    };
    report(client.book_appointment(&booking, &token).await)
}
