//! Client configuration.
//!
//! # Design
//! Every field has a default matching the deployed service, so an empty TOML
//! document is a valid configuration. Environment overrides are applied
//! through a lookup function; `from_env` passes `std::env::var`, tests pass a
//! closure.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_API_URL: &str = "SESSION_API_URL";
pub const ENV_LOGIN_PATH: &str = "SESSION_LOGIN_PATH";
pub const ENV_REFRESH_PATH: &str = "SESSION_REFRESH_PATH";
pub const ENV_LOGOUT_PATH: &str = "SESSION_LOGOUT_PATH";
pub const ENV_PROFILE_PATH: &str = "SESSION_PROFILE_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Paths of the authentication endpoints.
///
/// `login`, `refresh` and `logout` form the excluded-from-retry set: a
/// failure on any of them is returned directly and never starts a renewal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthPaths {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub profile: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login/".to_string(),
            refresh: "/auth/token/refresh/".to_string(),
            logout: "/auth/logout/".to_string(),
            profile: "/auth/me/".to_string(),
        }
    }
}

impl AuthPaths {
    /// Whether `target` (a path without query string) is one of the
    /// endpoints that must never go through renewal.
    pub fn is_excluded(&self, target: &str) -> bool {
        target == self.login || target == self.refresh || target == self.logout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_paths: AuthPaths,
    /// Statuses that mean "the access token is no longer valid".
    pub session_expired_statuses: Vec<u16>,
    /// Where the application should navigate once the session is lost.
    pub login_route: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            auth_paths: AuthPaths::default(),
            session_expired_statuses: vec![401],
            login_route: "/login".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = toml::from_str(content)?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup(ENV_LOGIN_PATH) {
            self.auth_paths.login = path;
        }
        if let Some(path) = lookup(ENV_REFRESH_PATH) {
            self.auth_paths.refresh = path;
        }
        if let Some(path) = lookup(ENV_LOGOUT_PATH) {
            self.auth_paths.logout = path;
        }
        if let Some(path) = lookup(ENV_PROFILE_PATH) {
            self.auth_paths.profile = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            errors.push(format!("base_url must be an http(s) URL, got {:?}", self.base_url));
        }
        let paths = [
            ("login", &self.auth_paths.login),
            ("refresh", &self.auth_paths.refresh),
            ("logout", &self.auth_paths.logout),
            ("profile", &self.auth_paths.profile),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                errors.push(format!("auth_paths.{name} must start with '/', got {path:?}"));
            }
        }
        if self.session_expired_statuses.is_empty() {
            errors.push("session_expired_statuses must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            errors.push("timeout_secs must be greater than zero".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn is_session_expired_status(&self, status: u16) -> bool {
        self.session_expired_statuses.contains(&status)
    }
}
