//! # nawafed
//!
//! Tender intake backend. Browser sessions are signed cookies pinned to the
//! client that logged in (user-agent hash plus network prefix) and revoked
//! after a period of inactivity; see [`guard`].

pub mod api;
pub mod cli;
pub mod guard;
pub mod kv;
pub mod tenders;
pub mod users;

pub use api::{APP_USER_AGENT, GIT_COMMIT_HASH};
