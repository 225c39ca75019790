//! Login, logout and session handlers.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use clinic_core::config::Config;
use clinic_core::login::{LoginForm, LoginState, RoleSessionManager};
use clinic_core::role::Role;
use clinic_core::session::{SessionStatus, mask_token};

use super::{TerminalUi, open_store};
use crate::cli::ReportedError;

pub async fn login_admin(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    login(config, Role::Admin, username, password).await
}

pub async fn login_doctor(config: &Config, email: &str, password: Option<String>) -> Result<()> {
    login(config, Role::Doctor, email, password).await
}

pub async fn login_patient(config: &Config, email: &str, password: Option<String>) -> Result<()> {
    login(config, Role::Patient, email, password).await
}

async fn login(
    config: &Config,
    role: Role,
    identifier: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    let mut manager = RoleSessionManager::from_config(config, open_store()?)?;
    let mut ui = TerminalUi::new(manager.resolver().origin(), config.open_browser);

    match manager
        .submit(LoginForm::new(role, identifier, password), &mut ui)
        .await
    {
        LoginState::Authenticated { role, token, .. } => {
            println!("Logged in as {} (token: {}).", role.label(), mask_token(&token));
            Ok(())
        }
        LoginState::Idle
        | LoginState::Submitting
        | LoginState::Rejected(_)
        | LoginState::Exhausted(_) => Err(ReportedError.into()),
    }
}

/// Reads one line from stdin, prompting when attached to a terminal.
fn read_password() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        io::stderr().flush()?;
    }

    let mut input = String::new();
    stdin
        .lock()
        .read_line(&mut input)
        .context("read password from stdin")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub fn logout(config: &Config, patient: bool) -> Result<()> {
    let mut manager = RoleSessionManager::from_config(config, open_store()?)?;
    let mut ui = TerminalUi::new(manager.resolver().origin(), false);

    if patient {
        manager.logout_patient(&mut ui)?;
        println!("Logged out. Browsing as patient.");
    } else {
        manager.logout(&mut ui)?;
        println!("Logged out.");
    }
    Ok(())
}

pub fn session(config: &Config) -> Result<()> {
    let mut manager = RoleSessionManager::from_config(config, open_store()?)?;
    let mut ui = TerminalUi::new(manager.resolver().origin(), false);

    match manager.check_session(&mut ui)? {
        SessionStatus::Active(session) => {
            println!(
                "Logged in as {} (token: {}).",
                session.role.label(),
                mask_token(&session.token)
            );
        }
        SessionStatus::Anonymous(Some(role)) => {
            println!("Browsing as {} (not logged in).", role.label());
        }
        SessionStatus::Anonymous(None) | SessionStatus::Expired(_) => {
            println!("Not logged in.");
        }
    }
    println!("Home: {}{}", manager.resolver().origin(), manager.home_path());
    Ok(())
}
