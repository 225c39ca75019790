//! Candidate login endpoints.
//!
//! Doctors and patients have one fixed route. Admin login probes a list of
//! guessed routes because deployments disagree on where the admin endpoint
//! lives; the last URL that returned a token is tried first.

use anyhow::Result;

use crate::config::Config;
use crate::role::Role;

/// Builds absolute endpoint URLs from the server origin and API prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResolver {
    origin: String,
    api_path: String,
    admin_override: Option<String>,
}

impl EndpointResolver {
    pub fn new(
        server_url: impl Into<String>,
        api_path: impl Into<String>,
        admin_override: Option<String>,
    ) -> Self {
        let server_url: String = server_url.into();
        let (origin, mount) = split_server_url(server_url.trim());
        let api_path: String = api_path.into();
        let api_path = api_path.trim().trim_end_matches('/');
        let api_path = if mount.is_empty() || api_path.is_empty() || api_path.starts_with('/') {
            format!("{mount}{api_path}")
        } else {
            format!("{mount}/{api_path}")
        };
        Self {
            origin,
            api_path,
            admin_override: admin_override
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    /// Resolves origin, prefix and admin override from env and config.
    ///
    /// # Errors
    /// Returns an error if the effective server URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.effective_server_url()?,
            config.effective_api_path(),
            config.effective_admin_login_url(),
        ))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Makes `path` absolute against the origin.
    /// Absolute http(s) URLs are returned unchanged.
    pub fn absolute(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.origin)
        } else {
            format!("{}/{path}", self.origin)
        }
    }

    /// Joins a REST route (e.g. `/doctor`) onto the API prefix.
    pub fn api_url(&self, route: &str) -> String {
        self.absolute(&format!("{}{route}", self.api_path))
    }

    /// Returns the ordered, non-empty list of login URLs for `role`.
    ///
    /// For admins, `last_good` is moved to the front when it is one of the
    /// candidates. It is ignored otherwise.
    pub fn resolve_candidates(&self, role: Role, last_good: Option<&str>) -> Vec<String> {
        match role {
            Role::Admin => self.admin_candidates(last_good),
            Role::Doctor => vec![self.api_url("/doctor/login")],
            Role::Patient | Role::LoggedPatient => vec![self.api_url("/patient/login")],
        }
    }

    fn admin_candidates(&self, last_good: Option<&str>) -> Vec<String> {
        let base = &self.api_path;
        let guesses = self
            .admin_override
            .iter()
            .cloned()
            .chain([
                format!("{base}/admin"),
                format!("{base}admin"),
                "/admin".to_string(),
                "/admin/login".to_string(),
            ]);

        let mut candidates: Vec<String> = Vec::new();
        for url in guesses.map(|path| self.absolute(&path)) {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }

        if let Some(cached) = last_good
            && let Some(pos) = candidates.iter().position(|url| url == cached)
        {
            let url = candidates.remove(pos);
            candidates.insert(0, url);
        }

        candidates
    }
}

/// Splits a server URL into its origin and the path it is mounted under.
/// A path in the server URL prefixes the API routes; root-relative paths
/// still resolve against the bare origin.
fn split_server_url(server_url: &str) -> (String, String) {
    match url::Url::parse(server_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            let mount = url.path().trim_end_matches('/').to_string();
            (url.origin().ascii_serialization(), mount)
        }
        _ => (server_url.trim_end_matches('/').to_string(), String::new()),
    }
}

fn is_absolute_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
