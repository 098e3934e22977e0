//! # Warden Shared Library
//!
//! The access-control core used by the Warden API server: workspace identity and
//! membership, tenant-scoped resource storage, per-resource sharing (including
//! anonymous link shares with view quotas), the invite lifecycle and the audit log.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their tenant-scoped queries
//! - `auth`: Credentials (passwords, JWTs, opaque tokens) and request middleware
//! - `engine`: Access control and the audited operations built on top of it
//! - `mailer`: Outbound e-mail used by the invite flow
//! - `db`: Connection pool and embedded migrations

pub mod auth;
pub mod db;
pub mod engine;
pub mod mailer;
pub mod models;

/// Current version of the Warden shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
