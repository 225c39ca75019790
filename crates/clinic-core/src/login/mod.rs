//! Role-based login.
//!
//! - `endpoints`: candidate login URLs per role
//! - `transport`: credential POSTs and response classification
//! - `manager`: the submit state machine and session lifecycle

pub mod endpoints;
pub mod manager;
pub mod transport;

use std::fmt;

use serde::Serialize;

pub use endpoints::EndpointResolver;
pub use manager::{AccessError, LoginState, LoginUi, RoleSessionManager};
pub use transport::{AttemptOutcome, Authenticated, LoginTransport, classify};

use crate::role::Role;

/// Message surfaced when every candidate endpoint was missing or unreachable.
pub const ENDPOINT_NOT_FOUND_MESSAGE: &str = "Login endpoint not found. Please try again later.";
/// Message surfaced for a 2xx response without a token field.
pub const TOKEN_MISSING_MESSAGE: &str = "Login succeeded but token is missing.";
/// Fallback message for 400/401 responses without a `message` field.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

/// Why a login attempt did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// A required form field is empty. Never reaches the network.
    Validation(String),
    /// The server rejected the credentials (or answered with a message).
    Credentials(String),
    /// No candidate endpoint answered.
    EndpointNotFound(String),
    /// The server accepted the login but returned no token.
    MalformedResponse(String),
}

impl LoginError {
    pub fn message(&self) -> &str {
        match self {
            LoginError::Validation(msg)
            | LoginError::Credentials(msg)
            | LoginError::EndpointNotFound(msg)
            | LoginError::MalformedResponse(msg) => msg,
        }
    }

    pub(crate) fn endpoint_not_found() -> Self {
        LoginError::EndpointNotFound(ENDPOINT_NOT_FOUND_MESSAGE.to_string())
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for LoginError {}

/// Raw login form as submitted by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub role: Role,
    /// Username for admins, email/identifier for doctors and patients.
    pub identifier: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(role: Role, identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            role,
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Checks field presence and builds the request payload.
    ///
    /// The identifier is trimmed; the password is taken verbatim.
    ///
    /// # Errors
    /// Returns `LoginError::Validation` if either field is empty.
    pub fn validate(self) -> Result<Credentials, LoginError> {
        let identifier = self.identifier.trim().to_string();
        let password = self.password;

        if identifier.is_empty() || password.is_empty() {
            let message = match self.role {
                Role::Admin => "Please enter both username and password.",
                Role::Doctor | Role::Patient | Role::LoggedPatient => {
                    "Please enter both email and password."
                }
            };
            return Err(LoginError::Validation(message.to_string()));
        }

        Ok(match self.role {
            Role::Admin => Credentials::Admin {
                username: identifier,
                password,
            },
            Role::Doctor => Credentials::Doctor {
                identifier,
                password,
            },
            Role::Patient | Role::LoggedPatient => Credentials::Patient {
                identifier,
                password,
            },
        })
    }
}

/// Validated credentials; serializes to the request body.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    Admin { username: String, password: String },
    Doctor { identifier: String, password: String },
    Patient { identifier: String, password: String },
}

impl Credentials {
    /// Role whose login route these credentials target.
    pub fn role(&self) -> Role {
        match self {
            Credentials::Admin { .. } => Role::Admin,
            Credentials::Doctor { .. } => Role::Doctor,
            Credentials::Patient { .. } => Role::Patient,
        }
    }

    /// Role persisted after a successful login.
    pub fn session_role(&self) -> Role {
        match self {
            Credentials::Admin { .. } => Role::Admin,
            Credentials::Doctor { .. } => Role::Doctor,
            Credentials::Patient { .. } => Role::LoggedPatient,
        }
    }

    /// Landing page after a successful login.
    pub fn landing_path(&self, token: &str) -> String {
        match self {
            Credentials::Admin { .. } => format!("/adminDashboard/{token}"),
            Credentials::Doctor { .. } => format!("/doctorDashboard/{token}"),
            Credentials::Patient { .. } => "/pages/loggedPatientDashboard.html".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Admin { username, .. } => f
                .debug_struct("Admin")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Doctor { identifier, .. } => f
                .debug_struct("Doctor")
                .field("identifier", identifier)
                .finish_non_exhaustive(),
            Credentials::Patient { identifier, .. } => f
                .debug_struct("Patient")
                .field("identifier", identifier)
                .finish_non_exhaustive(),
        }
    }
}
