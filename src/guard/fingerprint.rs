//! Client fingerprint used to pin a session to the browser and network it was issued to.
//!
//! The fingerprint is recomputed on every request and only compared against the
//! server-side record; it never travels in the cookie.
//!
//! IPv4 clients are reduced to their first three octets, including those that
//! reach a dual-stack listener as `::ffff:a.b.c.d`. Native IPv6 addresses are
//! compared verbatim, so IPv6 sessions break on any address change.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::net::IpAddr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent_hash: [u8; 32],
    pub network_prefix: String,
}

impl Fingerprint {
    #[must_use]
    pub fn new(user_agent: Option<&str>, peer: IpAddr) -> Self {
        Self {
            user_agent_hash: user_agent_hash(user_agent.unwrap_or_default()),
            network_prefix: network_prefix(peer),
        }
    }

    /// Hex rendering of the user-agent hash for diagnostics.
    #[must_use]
    pub fn user_agent_hex(&self) -> String {
        self.user_agent_hash
            .iter()
            .fold(String::with_capacity(64), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }
}

fn user_agent_hash(user_agent: &str) -> [u8; 32] {
    Sha256::digest(user_agent.trim().as_bytes()).into()
}

fn network_prefix(peer: IpAddr) -> String {
    match peer.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            format!("{a}.{b}.{c}")
        }
        IpAddr::V6(v6) => v6.to_string(),
    }
}
