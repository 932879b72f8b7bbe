//! User lookup and credential verification.
//!
//! The session guard never checks passwords; login hands credentials to a
//! [`UserDirectory`] and binds whatever profile it returns.

use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Normalized identity attached to a session after login.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub id: u64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read user directory {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid user directory {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("stored password hash for {0} is not a valid PHC string")]
    BadHash(String),
}

pub trait UserDirectory: Send + Sync {
    /// Returns the profile when the credentials match, `None` otherwise.
    ///
    /// # Errors
    /// Returns an error when the stored record itself is unusable.
    fn verify(&self, email: &str, password: &str) -> Result<Option<UserProfile>, DirectoryError>;
}

/// Normalize an email for lookups.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[derive(Deserialize)]
struct UserEntry {
    id: u64,
    email: String,
    role: String,
    password_hash: String,
}

struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

/// Directory loaded once from a JSON array of
/// `{"id", "email", "role", "password_hash"}` entries (Argon2 PHC hashes).
#[derive(Default)]
pub struct FileUserDirectory {
    users: HashMap<String, StoredUser>,
}

impl FileUserDirectory {
    /// Load the directory. A missing file yields an empty directory, so every
    /// login fails.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("User directory {} not found, logins disabled", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(DirectoryError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_json(&raw).map_err(|source| DirectoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    /// Returns an error if `raw` is not a JSON array of user entries.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<UserEntry> = serde_json::from_str(raw)?;
        let users = entries
            .into_iter()
            .map(|entry| {
                let email = normalize_email(&entry.email);
                let stored = StoredUser {
                    profile: UserProfile {
                        id: entry.id,
                        email: email.clone(),
                        role: entry.role,
                    },
                    password_hash: entry.password_hash,
                };
                (email, stored)
            })
            .collect();
        Ok(Self { users })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for FileUserDirectory {
    fn verify(&self, email: &str, password: &str) -> Result<Option<UserProfile>, DirectoryError> {
        let email = normalize_email(email);
        let Some(user) = self.users.get(&email) else {
            debug!("Login for unknown user");
            return Ok(None);
        };
        let hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| DirectoryError::BadHash(user.profile.email.clone()))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
        {
            Ok(Some(user.profile.clone()))
        } else {
            Ok(None)
        }
    }
}
