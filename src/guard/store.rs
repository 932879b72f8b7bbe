//! In-memory session table.
//!
//! Fingerprint, last-seen time and the bound user profile live in one entry so a
//! session can never exist with a profile but no record, or the other way round.
//! All access goes through one `tokio::sync::Mutex`; callers that read then write
//! (validate, orphan drop) hold the guard for the whole sequence.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use super::{error::BindError, fingerprint::Fingerprint, id::SessionId};

pub type Profile = Map<String, Value>;

#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub fingerprint: Fingerprint,
    pub last_seen: u64,
    profile: Option<Profile>,
}

impl SessionRecord {
    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    entries: HashMap<SessionId, SessionRecord>,
}

impl SessionTable {
    /// Insert a fresh record. An existing entry under the same id, profile included, is replaced.
    pub fn put(&mut self, session_id: SessionId, fingerprint: Fingerprint, now: u64) {
        self.entries.insert(
            session_id,
            SessionRecord {
                fingerprint,
                last_seen: now,
                profile: None,
            },
        );
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<&SessionRecord> {
        self.entries.get(session_id)
    }

    /// Refresh `last_seen`. Never moves it backwards. Returns `false` if the id is unknown.
    pub fn touch(&mut self, session_id: &SessionId, now: u64) -> bool {
        match self.entries.get_mut(session_id) {
            Some(record) => {
                record.last_seen = record.last_seen.max(now);
                true
            }
            None => false,
        }
    }

    /// Remove a record and its profile. Returns `true` if something was removed.
    pub fn delete(&mut self, session_id: &SessionId) -> bool {
        self.entries.remove(session_id).is_some()
    }

    /// Remove everything, returning how many sessions were dropped.
    pub fn clear_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// # Errors
    /// `NotAMapping` for non-object payloads, `UnknownSession` if no record exists.
    /// Nothing is stored on error.
    pub fn bind_user(&mut self, session_id: &SessionId, profile: Value) -> Result<(), BindError> {
        let Value::Object(profile) = profile else {
            return Err(BindError::NotAMapping);
        };
        let record = self
            .entries
            .get_mut(session_id)
            .ok_or(BindError::UnknownSession)?;
        record.profile = Some(profile);
        Ok(())
    }

    #[must_use]
    pub fn get_user(&self, session_id: &SessionId) -> Option<Profile> {
        self.entries
            .get(session_id)
            .and_then(|record| record.profile.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    table: Mutex<SessionTable>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().await
    }
}
