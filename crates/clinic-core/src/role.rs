//! User roles known to the clinic frontend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of session roles.
///
/// `Patient` is an anonymous visitor browsing as a patient; `LoggedPatient`
/// is a patient holding a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
    LoggedPatient,
}

impl Role {
    /// Returns all roles.
    pub fn all() -> &'static [Role] {
        &[
            Role::Admin,
            Role::Doctor,
            Role::Patient,
            Role::LoggedPatient,
        ]
    }

    /// Returns the tag persisted under `userRole`.
    pub fn id(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::LoggedPatient => "loggedPatient",
        }
    }

    /// Returns the Role for a persisted tag.
    pub fn from_id(id: &str) -> Option<Role> {
        match id.trim() {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            "loggedPatient" => Some(Role::LoggedPatient),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Patient => "Patient",
            Role::LoggedPatient => "Patient (logged in)",
        }
    }

    /// Privileged roles are only valid together with a token.
    pub fn is_privileged(&self) -> bool {
        match self {
            Role::Admin | Role::Doctor | Role::LoggedPatient => true,
            Role::Patient => false,
        }
    }

    /// Returns the home page for this role (the header logo target).
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/pages/adminDashboard.html",
            Role::Doctor => "/pages/doctorDashboard.html",
            Role::LoggedPatient => "/pages/loggedPatientDashboard.html",
            Role::Patient => "/",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_id(s).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown role '{s}'. Expected one of: admin, doctor, patient, loggedPatient"
            )
        })
    }
}
