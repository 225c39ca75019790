//! Config command handlers.

use anyhow::{Context, Result};
use clinic_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn set_server(url: &str) -> Result<()> {
    config::Config::save_server_url(url).context("save server URL")?;
    println!("Server set to {}", url.trim());
    Ok(())
}
