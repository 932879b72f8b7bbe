//! Session guard configuration.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

pub const DEFAULT_IDLE_SECONDS: u64 = 30 * 60;
pub const DEFAULT_COOKIE_NAME: &str = "nwgd_session";

/// `SameSite` attribute written on the session cookie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::InvalidSameSite(value.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct GuardConfig {
    secret: SecretString,
    idle_timeout_seconds: u64,
    cookie_name: String,
    same_site: SameSite,
}

impl GuardConfig {
    /// Build a config around the HMAC secret.
    ///
    /// # Errors
    /// Returns `ConfigError::EmptySecret` when the secret is empty or blank.
    pub fn new(secret: SecretString) -> Result<Self, ConfigError> {
        if secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self {
            secret,
            idle_timeout_seconds: DEFAULT_IDLE_SECONDS,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            same_site: SameSite::default(),
        })
    }

    #[must_use]
    pub fn with_idle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.idle_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: String) -> Self {
        self.cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn idle_timeout_seconds(&self) -> u64 {
        self.idle_timeout_seconds
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    pub(super) fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("secret", &"***")
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("cookie_name", &self.cookie_name)
            .field("same_site", &self.same_site)
            .finish()
    }
}
