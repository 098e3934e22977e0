//! # Warden API Server Library
//!
//! HTTP surface of the Warden access-control engine. Handlers deserialize requests,
//! call into `warden_shared::engine`, and translate engine errors into fixed status
//! codes.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and link rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
