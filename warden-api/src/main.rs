//! # Warden API Server
//!
//! Multi-tenant workspace access control: membership and invites, role-gated
//! resources, user/team/link sharing, and an audit log written in the same
//! transaction as every change.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/warden JWT_SECRET=$(openssl rand -hex 32) \
//!     cargo run -p warden-api
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_api::{app, config::Config};
use warden_shared::{db, mailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    tracing::info!(
        "Warden API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let pool = db::pool::create_pool(config.pool_config())
        .await
        .context("Failed to connect to database")?;

    db::migrations::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let mailer = mailer::from_config(&config.mail).context("Failed to configure mailer")?;
    let redis = connect_redis(config.rate_limit.redis_url.as_deref()).await;

    let bind_address = config.bind_address();
    let state = app::AppState::new(pool.clone(), config, mailer, redis);
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db::pool::close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

/// `RUST_LOG` filter; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warden_api=debug,warden_shared=debug,tower_http=debug,sqlx=warn".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Redis is optional; without it link resolution is not rate limited
async fn connect_redis(url: Option<&str>) -> Option<redis::aio::ConnectionManager> {
    let url = url?;

    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid REDIS_URL, link rate limiting disabled");
            return None;
        }
    };

    match redis::aio::ConnectionManager::new(client).await {
        Ok(conn) => {
            tracing::info!("Connected to Redis, link rate limiting enabled");
            Some(conn)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, link rate limiting disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
