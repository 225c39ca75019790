//! Patient command handlers.

use anyhow::Result;
use clinic_core::api::{ClinicClient, PatientSignup};
use clinic_core::config::Config;
use clinic_core::role::Role;

use super::{authorize, report};

pub async fn signup(config: &Config, signup: &PatientSignup) -> Result<()> {
    let client = ClinicClient::from_config(config)?;
    report(client.signup_patient(signup).await)
}

pub async fn me(config: &Config) -> Result<()> {
    let token = authorize(config, Role::LoggedPatient)?;
    let client = ClinicClient::from_config(config)?;

    let patient = client.patient_details(&token).await?;
    if let Some(id) = patient.id {
        println!("ID:      {id}");
    }
    println!("Name:    {}", patient.name);
    println!("Email:   {}", patient.email);
    println!("Phone:   {}", patient.phone);
    println!("Address: {}", patient.address);
    Ok(())
}
