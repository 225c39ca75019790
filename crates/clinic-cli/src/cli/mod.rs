//! CLI entry and dispatch.

use std::fmt;

use anyhow::{Context, Result};
use clap::Parser;
use clinic_core::config;

mod commands;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(version)]
#[command(about = "Smart Clinic terminal client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in as admin, doctor or patient
    Login {
        #[command(subcommand)]
        role: LoginCommands,
    },

    /// Log out and clear the stored session
    Logout {
        /// Drop the token but keep browsing as a patient
        #[arg(long)]
        patient: bool,
    },

    /// Show the stored session (expired sessions are reset)
    Session,

    /// Browse and manage doctors
    Doctors {
        #[command(subcommand)]
        command: DoctorCommands,
    },

    /// List and book appointments
    Appointments {
        #[command(subcommand)]
        command: AppointmentCommands,
    },

    /// Patient account
    Patient {
        #[command(subcommand)]
        command: PatientCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Password source shared by all login commands.
#[derive(clap::Args, Debug, Clone)]
struct PasswordArg {
    /// Password (read from stdin when omitted)
    #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(clap::Subcommand)]
enum LoginCommands {
    /// Log in as an administrator
    Admin {
        #[arg(long)]
        username: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Log in as a doctor
    Doctor {
        #[arg(long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Log in as a patient
    Patient {
        #[arg(long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
    },
}

#[derive(clap::Subcommand)]
enum DoctorCommands {
    /// List doctors, optionally filtered
    List {
        /// Name to search for
        #[arg(long)]
        name: Option<String>,
        /// Time of day (AM or PM)
        #[arg(long)]
        time: Option<String>,
        /// Specialty to filter by
        #[arg(long)]
        specialty: Option<String>,
    },
    /// Add a doctor (admin session required)
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        specialty: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        /// Available slot such as 09:00-10:00 (repeatable)
        #[arg(long = "slot", value_name = "SLOT")]
        slots: Vec<String>,
    },
    /// Delete a doctor (admin session required)
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(clap::Subcommand)]
enum AppointmentCommands {
    /// List the logged-in doctor's appointments for a day
    List {
        /// Day to show (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Filter by patient name
        #[arg(long)]
        patient: Option<String>,
    },
    /// Book an appointment as the logged-in patient
    Book {
        #[arg(long)]
        doctor_id: i64,
        /// Defaults to the logged-in patient's id
        #[arg(long)]
        patient_id: Option<i64>,
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Slot such as 09:00-10:00
        #[arg(long)]
        slot: String,
    },
}

#[derive(clap::Subcommand)]
enum PatientCommands {
    /// Create a patient account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
    },
    /// Show the logged-in patient's details
    Me,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the backend server URL
    SetServer {
        #[arg(value_name = "URL")]
        url: String,
    },
}

/// A failure whose message has already been printed.
#[derive(Debug)]
pub struct ReportedError;

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("command failed")
    }
}

impl std::error::Error for ReportedError {}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    match cli.command {
        Commands::Login { role } => match role {
            LoginCommands::Admin { username, password } => {
                commands::auth::login_admin(&config, &username, password.password).await
            }
            LoginCommands::Doctor { email, password } => {
                commands::auth::login_doctor(&config, &email, password.password).await
            }
            LoginCommands::Patient { email, password } => {
                commands::auth::login_patient(&config, &email, password.password).await
            }
        },
        Commands::Logout { patient } => commands::auth::logout(&config, patient),
        Commands::Session => commands::auth::session(&config),

        Commands::Doctors { command } => match command {
            DoctorCommands::List {
                name,
                time,
                specialty,
            } => commands::doctors::list(&config, name, time, specialty).await,
            DoctorCommands::Add {
                name,
                specialty,
                email,
                password,
                phone,
                slots,
            } => {
                let form = clinic_core::api::DoctorForm {
                    name,
                    specialty,
                    email,
                    password,
                    phone,
                    available_times: slots,
                };
                commands::doctors::add(&config, form).await
            }
            DoctorCommands::Delete { id } => commands::doctors::delete(&config, id).await,
        },

        Commands::Appointments { command } => match command {
            AppointmentCommands::List { date, patient } => {
                commands::appointments::list(&config, date, patient.as_deref()).await
            }
            AppointmentCommands::Book {
                doctor_id,
                patient_id,
                date,
                slot,
            } => commands::appointments::book(&config, doctor_id, patient_id, date, slot).await,
        },

        Commands::Patient { command } => match command {
            PatientCommands::Signup {
                name,
                email,
                password,
                phone,
                address,
            } => {
                let signup = clinic_core::api::PatientSignup {
                    name,
                    email,
                    password,
                    phone,
                    address,
                };
                commands::patient::signup(&config, &signup).await
            }
            PatientCommands::Me => commands::patient::me(&config).await,
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetServer { url } => commands::config::set_server(&url),
        },
    }
}
