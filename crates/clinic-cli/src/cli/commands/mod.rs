//! CLI command handlers.

pub mod appointments;
pub mod auth;
pub mod config;
pub mod doctors;
pub mod patient;

use anyhow::{Context, Result, bail};
use clinic_core::api::ApiReply;
use clinic_core::config::Config;
use clinic_core::login::{AccessError, LoginUi, RoleSessionManager};
use clinic_core::role::Role;
use clinic_core::session::SessionStore;
use tracing::debug;

use super::ReportedError;

/// Terminal rendering of login outcomes. Navigation prints the target URL
/// and, when enabled, opens it in a browser.
struct TerminalUi {
    origin: String,
    open_browser: bool,
}

impl TerminalUi {
    fn new(origin: &str, open_browser: bool) -> Self {
        Self {
            origin: origin.to_string(),
            // skip in tests
            open_browser: open_browser && std::env::var("CLINIC_NO_BROWSER").is_err(),
        }
    }
}

impl LoginUi for TerminalUi {
    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn close_modal(&mut self) {}

    fn navigate(&mut self, path: &str) {
        let url = format!("{}{path}", self.origin);
        println!("Open: {url}");
        if self.open_browser
            && let Err(err) = open::that(&url)
        {
            debug!(error = %err, "could not open browser");
        }
    }
}

fn open_store() -> Result<SessionStore> {
    SessionStore::open_default().context("open session store")
}

/// `clinic login` subcommand that produces `role`.
fn login_command(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Doctor => "doctor",
        Role::Patient | Role::LoggedPatient => "patient",
    }
}

/// Checks the stored session and returns its token when it belongs to
/// `required`. Refusals never reach the network.
fn authorize(config: &Config, required: Role) -> Result<String> {
    let mut manager = RoleSessionManager::from_config(config, open_store()?)?;
    let mut ui = TerminalUi::new(manager.resolver().origin(), false);

    let err = match manager.authorize(required, &mut ui) {
        Ok(session) => return Ok(session.token),
        Err(err) => err,
    };
    let Some(denied) = err.downcast_ref::<AccessError>() else {
        return Err(err);
    };
    match denied {
        // already reported by the session check
        AccessError::Expired { .. } => Err(ReportedError.into()),
        AccessError::NotLoggedIn { required } => bail!(
            "Not logged in. Run `clinic login {}` first.",
            login_command(*required)
        ),
        AccessError::WrongRole { required, actual } => bail!(
            "This command needs the {} role, but you are logged in as {}. Run `clinic login {}` first.",
            required.label(),
            actual.label(),
            login_command(*required)
        ),
    }
}

/// Prints a mutation's message; failures become a non-zero exit.
fn report(reply: ApiReply) -> Result<()> {
    if reply.success {
        println!("{}", reply.message);
        Ok(())
    } else {
        eprintln!("{}", reply.message);
        Err(ReportedError.into())
    }
}
