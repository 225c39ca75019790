//! Doctor command handlers.

use anyhow::Result;
use clinic_core::api::{ClinicClient, Doctor, DoctorForm};
use clinic_core::config::Config;
use clinic_core::role::Role;
use comfy_table::Table;

use super::{authorize, report};

pub async fn list(
    config: &Config,
    name: Option<String>,
    time: Option<String>,
    specialty: Option<String>,
) -> Result<()> {
    let client = ClinicClient::from_config(config)?;
    let filtered = name.is_some() || time.is_some() || specialty.is_some();

    let doctors = if filtered {
        client
            .filter_doctors(
                name.as_deref().unwrap_or_default(),
                time.as_deref().unwrap_or_default(),
                specialty.as_deref().unwrap_or_default(),
            )
            .await?
    } else {
        client.list_doctors().await
    };

    if doctors.is_empty() {
        if filtered {
            println!("No doctors found with the given filters.");
        } else {
            println!("No doctors found.");
        }
    } else {
        println!("{}", doctor_table(&doctors));
    }
    Ok(())
}

fn doctor_table(doctors: &[Doctor]) -> Table {
    let mut table = Table::new();
    table.set_header(["ID", "Name", "Specialty", "Email", "Phone", "Available"]);
    for doctor in doctors {
        table.add_row([
            doctor.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            doctor.name.clone(),
            doctor.specialty.clone(),
            doctor.email.clone(),
            doctor.phone.clone(),
            doctor.available_times.join(", "),
        ]);
    }
    table
}

pub async fn add(config: &Config, form: DoctorForm) -> Result<()> {
    let token = authorize(config, Role::Admin)?;
    let client = ClinicClient::from_config(config)?;
    report(client.add_doctor(form, Some(&token)).await)
}

pub async fn delete(config: &Config, id: i64) -> Result<()> {
    let token = authorize(config, Role::Admin)?;
    let client = ClinicClient::from_config(config)?;
    report(client.delete_doctor(id, &token).await)
}
