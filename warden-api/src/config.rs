/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: `*`)
/// - `PRODUCTION`: Enables HSTS and strict CORS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DB_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`: SMTP
///   mailer; without `SMTP_HOST` invite e-mails are logged
/// - `FRONTEND_URL`: Base of invite accept links (default: http://localhost:3000)
/// - `INVITE_TTL_DAYS`: Invite lifetime (default: 7)
/// - `LINK_DEFAULT_TTL_DAYS`: Link share lifetime when none is given (default: 30)
/// - `REDIS_URL`: Enables rate limiting of public link resolution
/// - `LINK_RATE_LIMIT_PER_MINUTE`: Link resolutions per client per minute (default: 60)
/// - `RUST_LOG`, `LOG_FORMAT`: read by the binary, not here
///
/// # Example
///
/// ```no_run
/// use warden_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use warden_shared::db::pool::DatabaseConfig as PoolConfig;
use warden_shared::engine::members::{InviteSettings, DEFAULT_INVITE_TTL_DAYS};
use warden_shared::engine::sharing::{LinkSettings, DEFAULT_LINK_TTL_DAYS};
use warden_shared::mailer::{MailConfig, DEFAULT_FROM};

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Outbound e-mail
    pub mail: MailConfig,

    /// Invite and link-share lifetimes
    pub links: LinkConfig,

    /// Rate limiting of `GET /s/:token`
    pub rate_limit: RateLimitConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Base URL of the web client
    pub frontend_url: String,
    pub invite_ttl_days: i64,
    pub link_default_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// No URL disables rate limiting
    pub redis_url: Option<String>,
    pub link_requests_per_minute: u32,

    /// Reverse proxies in front of the server that append to `X-Forwarded-For`;
    /// zero ignores the header
    pub trusted_proxy_hops: usize,
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            var("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret =
            var("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long");
        }

        let cors_origins = var("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        let invite_ttl_days = parse_or(var("INVITE_TTL_DAYS"), "INVITE_TTL_DAYS", DEFAULT_INVITE_TTL_DAYS)?;
        if invite_ttl_days < 1 {
            anyhow::bail!("INVITE_TTL_DAYS must be at least 1");
        }

        let link_default_ttl_days =
            parse_or(var("LINK_DEFAULT_TTL_DAYS"), "LINK_DEFAULT_TTL_DAYS", DEFAULT_LINK_TTL_DAYS)?;
        if link_default_ttl_days < 1 {
            anyhow::bail!("LINK_DEFAULT_TTL_DAYS must be at least 1");
        }

        let link_requests_per_minute =
            parse_or(var("LINK_RATE_LIMIT_PER_MINUTE"), "LINK_RATE_LIMIT_PER_MINUTE", 60u32)?;
        if link_requests_per_minute == 0 {
            anyhow::bail!("LINK_RATE_LIMIT_PER_MINUTE must be at least 1");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(var("API_PORT"), "API_PORT", 8080u16)?,
                cors_origins,
                production: parse_or(var("PRODUCTION"), "PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10u32)?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            mail: MailConfig {
                smtp_host: var("SMTP_HOST"),
                smtp_port: var("SMTP_PORT")
                    .map(|p| p.parse::<u16>())
                    .transpose()
                    .map_err(|e| anyhow::anyhow!("SMTP_PORT is invalid: {e}"))?,
                smtp_username: var("SMTP_USERNAME"),
                smtp_password: var("SMTP_PASSWORD"),
                from: var("SMTP_FROM").unwrap_or_else(|| DEFAULT_FROM.to_string()),
            },
            links: LinkConfig {
                frontend_url: var("FRONTEND_URL")
                    .unwrap_or_else(|| "http://localhost:3000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                invite_ttl_days,
                link_default_ttl_days,
            },
            rate_limit: RateLimitConfig {
                redis_url: var("REDIS_URL"),
                link_requests_per_minute,
                trusted_proxy_hops: parse_or(var("TRUSTED_PROXY_HOPS"), "TRUSTED_PROXY_HOPS", 0usize)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Pool settings for [`warden_shared::db::pool::create_pool`]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..PoolConfig::default()
        }
    }

    pub fn invite_settings(&self) -> InviteSettings {
        InviteSettings {
            ttl: chrono::Duration::days(self.links.invite_ttl_days),
            frontend_url: self.links.frontend_url.clone(),
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            default_ttl: chrono::Duration::days(self.links.link_default_ttl_days),
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ({raw}): {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.mail.smtp_host.is_none());
        assert_eq!(config.links.frontend_url, "http://localhost:3000");
        assert_eq!(config.links.invite_ttl_days, 7);
        assert_eq!(config.links.link_default_ttl_days, 30);
        assert!(config.rate_limit.redis_url.is_none());
        assert_eq!(config.rate_limit.link_requests_per_minute, 60);
        assert_eq!(config.rate_limit.trusted_proxy_hops, 0);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PRODUCTION", "true"),
            ("DB_MAX_CONNECTIONS", "25"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("FRONTEND_URL", "https://app.example.com/"),
            ("INVITE_TTL_DAYS", "3"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("TRUSTED_PROXY_HOPS", "1"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.api.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert!(config.api.production);
        assert_eq!(config.pool_config().max_connections, 25);
        assert_eq!(config.mail.smtp_port, Some(2525));
        assert_eq!(config.links.frontend_url, "https://app.example.com");
        assert_eq!(config.invite_settings().ttl, chrono::Duration::days(3));
        assert_eq!(config.rate_limit.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.rate_limit.trusted_proxy_hops, 1);
    }

    #[test]
    fn test_required_values() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/test")]).is_err());

        let err = load(&[("DATABASE_URL", "postgresql://localhost/test"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_invalid_numbers_fail() {
        let err = load(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("API_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("API_PORT"));

        assert!(load(&[
            ("DATABASE_URL", "postgresql://localhost/test"),
            ("JWT_SECRET", SECRET),
            ("LINK_DEFAULT_TTL_DAYS", "0"),
        ])
        .is_err());
    }
}
