//! Configuration management for the clinic client.
//!
//! Loads configuration from ${CLINIC_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `server_url`.
pub const SERVER_URL_ENV: &str = "CLINIC_SERVER_URL";
/// Environment variable overriding `api_path`.
pub const API_PATH_ENV: &str = "CLINIC_API_PATH";
/// Environment variable overriding `admin_login_url`.
pub const ADMIN_LOGIN_URL_ENV: &str = "CLINIC_ADMIN_LOGIN_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Lays the user's settings over the default template, so template
/// comments and newly added settings show up while user values win.
/// The schema is flat: every top-level entry is copied as a whole.
fn refresh_from_template(user_config: &str) -> Result<toml_edit::DocumentMut> {
    let mut doc: toml_edit::DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: toml_edit::DocumentMut =
        user_config.parse().context("Failed to parse user config")?;

    for (key, item) in user_doc.iter() {
        if !item.is_none() {
            doc[key] = item.clone();
        }
    }
    Ok(doc)
}

pub mod paths {
    //! Path resolution for clinic configuration and session data.
    //!
    //! CLINIC_HOME resolution order:
    //! 1. CLINIC_HOME environment variable (if set)
    //! 2. ~/.config/clinic (default)

    use std::path::PathBuf;

    /// Returns the clinic home directory.
    pub fn clinic_home() -> PathBuf {
        if let Ok(home) = std::env::var("CLINIC_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_default()
            .join(".config")
            .join("clinic")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        clinic_home().join("config.toml")
    }

    /// Returns the path to the persisted session store.
    pub fn session_path() -> PathBuf {
        clinic_home().join("session.json")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin of the clinic backend
    pub server_url: String,

    /// Path prefix for REST routes (the `{base}` of every endpoint)
    pub api_path: String,

    /// Explicit admin login endpoint tried before the guessed routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_login_url: Option<String>,

    /// Per-request timeout in seconds (0 disables)
    pub request_timeout_secs: u64,

    /// Open the landing page in a browser after login
    pub open_browser: bool,
}

impl Config {
    pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the server_url field to the config file.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_server_url(server_url: &str) -> Result<()> {
        Self::save_server_url_to(&paths::config_path(), server_url)
    }

    /// Saves only the server_url field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_server_url_to(path: &Path, server_url: &str) -> Result<()> {
        let server_url = server_url.trim();
        validate_url(server_url, "server")?;

        let user_config = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            String::new()
        };
        let mut doc = refresh_from_template(&user_config)
            .with_context(|| format!("Failed to update config at {}", path.display()))?;
        doc["server_url"] = toml_edit::value(server_url);

        replace_file(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        replace_file(path, default_config_template())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    /// Resolves the backend origin with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the winning value is not a valid URL.
    pub fn effective_server_url(&self) -> Result<String> {
        let url = pick_setting(std::env::var(SERVER_URL_ENV).ok(), Some(&self.server_url))
            .unwrap_or_else(|| Self::DEFAULT_SERVER_URL.to_string());
        validate_url(&url, "server")?;
        Ok(url)
    }

    /// Resolves the API path prefix with precedence: env > config.
    pub fn effective_api_path(&self) -> String {
        pick_setting(std::env::var(API_PATH_ENV).ok(), Some(&self.api_path)).unwrap_or_default()
    }

    /// Resolves the admin login override with precedence: env > config.
    pub fn effective_admin_login_url(&self) -> Option<String> {
        pick_setting(
            std::env::var(ADMIN_LOGIN_URL_ENV).ok(),
            self.admin_login_url.as_deref(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: Self::DEFAULT_SERVER_URL.to_string(),
            api_path: String::new(),
            admin_login_url: None,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            open_browser: false,
        }
    }
}

/// Replaces `path` with `content` through a sibling temp file and a rename.
fn replace_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let staged = path.with_extension("toml.tmp");
    fs::write(&staged, content)
        .with_context(|| format!("Failed to write config to {}", staged.display()))?;
    fs::rename(&staged, path)
        .with_context(|| format!("Failed to move config into place at {}", path.display()))
}

/// Picks the first non-blank value, env before config.
fn pick_setting(env_value: Option<String>, config_value: Option<&str>) -> Option<String> {
    env_value
        .as_deref()
        .into_iter()
        .chain(config_value)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str, what: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {what} URL: {url}"))?;
    Ok(())
}
