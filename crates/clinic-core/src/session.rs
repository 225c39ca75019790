//! Session storage.
//!
//! The session is a flat string map with three well-known keys: `token`,
//! `userRole` and `adminLogin.lastGoodUrl`. The file backend keeps it in
//! `<base>/session.json` with restricted permissions (0600).
//! Tokens are never logged or displayed in full.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::paths;
use crate::role::Role;

/// Bearer token of the current session.
pub const TOKEN_KEY: &str = "token";
/// Role tag of the current session.
pub const ROLE_KEY: &str = "userRole";
/// Older builds stored the role under this key.
pub const LEGACY_ROLE_KEY: &str = "role";
/// Last admin login URL that returned a token.
pub const ADMIN_LAST_GOOD_URL_KEY: &str = "adminLogin.lastGoodUrl";

/// A pending change to one key: `Some` sets the value, `None` removes it.
pub type Change<'a> = (&'a str, Option<&'a str>);

/// Key-value backend behind the session store.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    /// Returns an error if the backend cannot persist the value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    /// Returns an error if the backend cannot persist the removal.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Applies several changes together. Backends that persist to disk
    /// write them in one go and keep the old state if that write fails.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the changes.
    fn apply(&mut self, changes: &[Change<'_>]) -> Result<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// Volatile storage, used by tests and embedders that keep state elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON file storage. Every mutation rewrites the whole file; a failed
/// write leaves the in-memory entries as they were.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens the storage file, starting empty if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse session from {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(&[(key, Some(value))])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.apply(&[(key, None)])
    }

    fn apply(&mut self, changes: &[Change<'_>]) -> Result<()> {
        let previous = self.entries.clone();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    self.entries.insert((*key).to_string(), (*value).to_string());
                }
                None => {
                    self.entries.remove(*key);
                }
            }
        }
        if self.entries == previous {
            return Ok(());
        }

        if let Err(err) = self.save() {
            self.entries = previous;
            return Err(err);
        }
        Ok(())
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub role: Role,
}

/// Result of checking the stored session against the token invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No token required: no role, or the anonymous patient role.
    Anonymous(Option<Role>),
    /// Privileged role with a token.
    Active(Session),
    /// Privileged role without a token. The role has been cleared.
    Expired(Role),
}

/// Typed access to the session keys over any [`Storage`] backend.
pub struct SessionStore {
    storage: Box<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    /// Opens the file-backed store at `<base>/session.json`.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(FileStorage::open(paths::session_path())?))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.storage.get(key)
    }

    /// # Errors
    /// Returns an error if the backend cannot persist the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.set(key, value)
    }

    /// # Errors
    /// Returns an error if the backend cannot persist the removal.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.storage.remove(key)
    }

    /// Returns the stored token, treating an empty value as absent.
    pub fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    /// Returns the stored role, falling back to the legacy key.
    /// Unrecognized tags read as no role.
    pub fn role(&self) -> Option<Role> {
        self.get(ROLE_KEY)
            .or_else(|| self.get(LEGACY_ROLE_KEY))
            .and_then(|id| Role::from_id(&id))
    }

    /// Persists a freshly authenticated session.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the session.
    pub fn save_session(&mut self, session: &Session) -> Result<()> {
        self.storage.apply(&[
            (TOKEN_KEY, Some(session.token.as_str())),
            (ROLE_KEY, Some(session.role.id())),
            (LEGACY_ROLE_KEY, None),
        ])?;
        info!(
            role = session.role.id(),
            token = %mask_token(&session.token),
            "session saved"
        );
        Ok(())
    }

    /// Stores a role choice without a token (e.g. browsing as a patient).
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the role.
    pub fn select_role(&mut self, role: Role) -> Result<()> {
        self.set(ROLE_KEY, role.id())
    }

    /// Removes token and role. The admin endpoint cache survives.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the removal.
    pub fn clear(&mut self) -> Result<()> {
        self.storage.apply(&[(TOKEN_KEY, None), (ROLE_KEY, None)])?;
        info!("session cleared");
        Ok(())
    }

    pub fn last_good_admin_url(&self) -> Option<String> {
        self.get(ADMIN_LAST_GOOD_URL_KEY)
            .filter(|url| !url.is_empty())
    }

    /// # Errors
    /// Returns an error if the backend cannot persist the URL.
    pub fn remember_admin_url(&mut self, url: &str) -> Result<()> {
        debug!(url, "caching admin login endpoint");
        self.set(ADMIN_LAST_GOOD_URL_KEY, url)
    }

    /// Applies the session invariant: a privileged role needs a token.
    ///
    /// Migrates a legacy `role` entry to `userRole` first. When a privileged
    /// role has no token the role is removed and `Expired` is returned.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the migration or reset.
    pub fn check(&mut self) -> Result<SessionStatus> {
        if self.get(ROLE_KEY).is_none()
            && let Some(legacy) = self.get(LEGACY_ROLE_KEY)
        {
            self.set(ROLE_KEY, &legacy)?;
        }

        let role = self.role();
        match (role, self.token()) {
            (Some(role), Some(token)) if role.is_privileged() => {
                Ok(SessionStatus::Active(Session { token, role }))
            }
            (Some(role), None) if role.is_privileged() => {
                info!(role = role.id(), "privileged role without token, resetting session");
                self.remove(ROLE_KEY)?;
                Ok(SessionStatus::Expired(role))
            }
            (role, _) => Ok(SessionStatus::Anonymous(role)),
        }
    }
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}
