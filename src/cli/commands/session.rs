use crate::guard::{GuardConfig, SameSite, DEFAULT_COOKIE_NAME};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_IDLE_SECONDS: &str = "session-idle-seconds";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_SAMESITE: &str = "session-samesite";

#[derive(Clone)]
pub struct Options {
    pub secret: SecretString,
    pub idle_seconds: u64,
    pub cookie_name: String,
    pub same_site: SameSite,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or the `SameSite` policy is unknown.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .with_context(|| format!("missing required argument: --{ARG_SESSION_SECRET}"))?;
        let same_site = matches
            .get_one::<String>(ARG_SESSION_SAMESITE)
            .map_or(Ok(SameSite::default()), |value| value.parse())?;

        Ok(Self {
            secret: SecretString::from(secret),
            idle_seconds: matches
                .get_one::<u64>(ARG_SESSION_IDLE_SECONDS)
                .copied()
                .unwrap_or(crate::guard::DEFAULT_IDLE_SECONDS),
            cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            same_site,
        })
    }

    /// # Errors
    /// Returns an error if the secret is empty.
    pub fn guard_config(&self) -> Result<GuardConfig> {
        Ok(GuardConfig::new(self.secret.clone())?
            .with_idle_timeout_seconds(self.idle_seconds)
            .with_cookie_name(self.cookie_name.clone())
            .with_same_site(self.same_site))
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("secret", &"***")
            .field("idle_seconds", &self.idle_seconds)
            .field("cookie_name", &self.cookie_name)
            .field("same_site", &self.same_site)
            .finish()
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("HMAC key used to sign session cookies")
                .env("SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_IDLE_SECONDS)
                .long(ARG_SESSION_IDLE_SECONDS)
                .help("Seconds of inactivity after which a session is revoked")
                .env("SESSION_IDLE_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Session cookie name")
                .env("SESSION_COOKIE_NAME")
                .default_value(DEFAULT_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_SESSION_SAMESITE)
                .long(ARG_SESSION_SAMESITE)
                .help("SameSite policy of the session cookie: Strict, Lax or None")
                .env("SESSION_SAMESITE")
                .default_value("Lax"),
        )
}
