//! Cookie token codec: `base64url(session_id) "." base64url(HMAC-SHA256(secret, session_id))`.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{error::ConfigError, id::SessionId};

type HmacSha256 = Hmac<Sha256>;

pub struct TokenCodec {
    mac: HmacSha256,
}

impl TokenCodec {
    /// # Errors
    /// Returns `ConfigError::EmptySecret` if the key is empty.
    pub fn new(secret: &SecretString) -> Result<Self, ConfigError> {
        let key = secret.expose_secret().as_bytes();
        if key.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| ConfigError::EmptySecret)?;
        Ok(Self { mac })
    }

    fn sign(&self, raw: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(raw);
        Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
    }

    #[must_use]
    pub fn pack(&self, session_id: &SessionId) -> String {
        let raw = session_id.as_str().as_bytes();
        format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(raw),
            self.sign(raw)
        )
    }

    /// Verify a token and return the session id it carries.
    ///
    /// Any malformed input or signature mismatch yields `None`.
    #[must_use]
    pub fn unpack(&self, token: &str) -> Option<SessionId> {
        let (payload, signature) = token.split_once('.')?;
        let raw = Base64UrlUnpadded::decode_vec(payload).ok()?;
        // Only the canonical encoding of an id is accepted.
        if Base64UrlUnpadded::encode_string(&raw) != payload {
            return None;
        }
        let expected = self.sign(&raw);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return None;
        }
        let id = String::from_utf8(raw).ok()?;
        if id.is_empty() {
            return None;
        }
        Some(SessionId::from(id))
    }
}
