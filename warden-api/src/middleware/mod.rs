/// Middleware modules for the API server
///
/// - `security`: security headers on every response
/// - `rate_limit`: Redis token bucket for public link resolution

pub mod rate_limit;
pub mod security;
