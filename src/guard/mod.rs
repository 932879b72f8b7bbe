//! Session guard.
//!
//! Issues signed session cookies, pins each session to the fingerprint of the
//! client it was issued to, and enforces an idle timeout.
//!
//! ## Validation order
//!
//! 1. cookie missing → `NoSession`
//! 2. signature or encoding invalid → `BadSignature`
//! 3. unknown id → `SessionExpired`
//! 4. idle longer than the configured window → record dropped, `IdleTimeout`
//! 5. user-agent hash differs → `BrowserChanged`
//! 6. network prefix differs → `NetworkChanged`
//! 7. otherwise `last_seen` is refreshed
//!
//! All state is process-local: a restart revokes every session.

mod clock;
mod codec;
mod config;
mod error;
mod fingerprint;
mod id;
mod request;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::TokenCodec;
pub use config::{GuardConfig, SameSite, DEFAULT_COOKIE_NAME, DEFAULT_IDLE_SECONDS};
pub use error::{AuthError, BindError, ConfigError};
pub use fingerprint::Fingerprint;
pub use id::SessionId;
pub use request::ClientRequest;
pub use store::Profile;

use axum::http::{
    header::{InvalidHeaderValue, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use store::{SessionStore, SessionTable};

/// Outcome of a successful validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub fingerprint: Fingerprint,
    /// `last_seen` as it was before this access.
    pub previous_seen: u64,
}

/// A validated session that carries a bound user profile.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub session: ActiveSession,
    pub profile: Profile,
}

pub struct SessionGuard {
    config: GuardConfig,
    codec: TokenCodec,
    store: SessionStore,
    clock: Arc<dyn Clock>,
}

impl SessionGuard {
    /// # Errors
    /// Returns `ConfigError` if the secret cannot key the codec.
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// # Errors
    /// Returns `ConfigError` if the secret cannot key the codec.
    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let codec = TokenCodec::new(config.secret())?;
        Ok(Self {
            config,
            codec,
            store: SessionStore::new(),
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Record a new session for the requesting client and set its cookie on `response`.
    ///
    /// # Errors
    /// Returns an error if the cookie cannot be encoded as a header value; nothing is
    /// stored in that case.
    pub async fn issue(
        &self,
        response: &mut HeaderMap,
        request: &ClientRequest,
        session_id: &SessionId,
    ) -> Result<(), InvalidHeaderValue> {
        let cookie = self.session_cookie(&self.codec.pack(session_id))?;
        let fingerprint = request.fingerprint();
        {
            let mut table = self.store.lock().await;
            let now = self.clock.now();
            table.put(session_id.clone(), fingerprint, now);
        }
        response.append(SET_COOKIE, cookie);
        info!(session = session_id.short(), "session issued");
        Ok(())
    }

    /// # Errors
    /// Returns the first failed check, see the module docs for the order.
    pub async fn validate(&self, request: &ClientRequest) -> Result<ActiveSession, AuthError> {
        let session_id = self.session_id(request)?;
        let fingerprint = request.fingerprint();
        let mut table = self.store.lock().await;
        self.validate_locked(&mut table, session_id, fingerprint)
    }

    /// Validate and require a bound user profile.
    ///
    /// A session that passes validation but has no profile is dropped.
    ///
    /// # Errors
    /// Any `validate` failure, or `SessionUserMissing`.
    pub async fn require_active_user(
        &self,
        request: &ClientRequest,
    ) -> Result<AuthenticatedUser, AuthError> {
        let session_id = self.session_id(request)?;
        let fingerprint = request.fingerprint();
        let mut table = self.store.lock().await;
        let session = self.validate_locked(&mut table, session_id, fingerprint)?;
        match table.get_user(&session.session_id) {
            Some(profile) => Ok(AuthenticatedUser { session, profile }),
            None => {
                table.delete(&session.session_id);
                info!(
                    session = session.session_id.short(),
                    "orphaned session dropped"
                );
                Err(AuthError::SessionUserMissing)
            }
        }
    }

    /// Session id carried by the request cookie, signature checked.
    ///
    /// # Errors
    /// `NoSession` if the cookie is absent, `BadSignature` if it does not verify.
    pub fn session_id(&self, request: &ClientRequest) -> Result<SessionId, AuthError> {
        let token = request
            .cookie(self.config.cookie_name())
            .ok_or(AuthError::NoSession)?;
        self.codec.unpack(token).ok_or_else(|| {
            debug!(reason = AuthError::BadSignature.as_str(), "session rejected");
            AuthError::BadSignature
        })
    }

    fn validate_locked(
        &self,
        table: &mut SessionTable,
        session_id: SessionId,
        fingerprint: Fingerprint,
    ) -> Result<ActiveSession, AuthError> {
        let now = self.clock.now();
        let Some(record) = table.get(&session_id) else {
            return Err(self.reject(&session_id, AuthError::SessionExpired));
        };
        let previous_seen = record.last_seen;
        let same_browser = record.fingerprint.user_agent_hash == fingerprint.user_agent_hash;
        let same_network = record.fingerprint.network_prefix == fingerprint.network_prefix;

        if now.saturating_sub(previous_seen) > self.config.idle_timeout_seconds() {
            table.delete(&session_id);
            return Err(self.reject(&session_id, AuthError::IdleTimeout));
        }
        if !same_browser {
            return Err(self.reject(&session_id, AuthError::BrowserChanged));
        }
        if !same_network {
            return Err(self.reject(&session_id, AuthError::NetworkChanged));
        }

        table.touch(&session_id, now);
        debug!(session = session_id.short(), "session touched");
        Ok(ActiveSession {
            session_id,
            fingerprint,
            previous_seen,
        })
    }

    fn reject(&self, session_id: &SessionId, error: AuthError) -> AuthError {
        debug!(
            session = session_id.short(),
            reason = error.as_str(),
            "session rejected"
        );
        error
    }

    /// Remove one session and its profile. Dropping an unknown id is a no-op.
    pub async fn drop_session(&self, session_id: &SessionId) {
        if self.store.lock().await.delete(session_id) {
            info!(session = session_id.short(), "session dropped");
        }
    }

    /// Revoke every session at once.
    pub async fn rotate_all(&self) -> usize {
        let dropped = self.store.lock().await.clear_all();
        info!(dropped, "all sessions revoked");
        dropped
    }

    /// Attach a user profile to an issued session.
    ///
    /// # Errors
    /// `NotAMapping` for non-object payloads, `UnknownSession` if the id is not live.
    pub async fn bind_user(&self, session_id: &SessionId, profile: Value) -> Result<(), BindError> {
        self.store.lock().await.bind_user(session_id, profile)
    }

    pub async fn get_user(&self, session_id: &SessionId) -> Option<Profile> {
        self.store.lock().await.get_user(session_id)
    }

    /// Number of sessions currently held, expired-but-unswept included.
    pub async fn session_count(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Expire the session cookie on `response`.
    ///
    /// # Errors
    /// Returns an error if the cookie cannot be encoded as a header value.
    pub fn clear_cookie(&self, response: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        let cookie = format!("{}; Max-Age=0", self.cookie_string(""));
        response.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        Ok(())
    }

    fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.cookie_string(token))
    }

    fn cookie_string(&self, value: &str) -> String {
        format!(
            "{}={value}; HttpOnly; Secure; SameSite={}; Path=/",
            self.config.cookie_name(),
            self.config.same_site()
        )
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
