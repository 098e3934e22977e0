/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use warden_api::{app::AppState, config::Config};
/// use warden_shared::mailer::LogMailer;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(LogMailer), None);
/// let app = warden_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use warden_shared::auth::middleware::create_jwt_middleware;
use warden_shared::engine::members::InviteSettings;
use warden_shared::engine::sharing::LinkSettings;
use warden_shared::mailer::Mailer;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Invite e-mail delivery
    pub mailer: Arc<dyn Mailer>,

    /// Present when `REDIS_URL` is configured; enables link rate limiting
    pub redis: Option<ConnectionManager>,

    pub invites: Arc<InviteSettings>,
    pub links: Arc<LinkSettings>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>, redis: Option<ConnectionManager>) -> Self {
        Self {
            db,
            invites: Arc::new(config.invite_settings()),
            links: Arc::new(config.link_settings()),
            config: Arc::new(config),
            mailer,
            redis,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                  # Health check (public)
/// ├── /s/:token                                # Link share resolution (public, rate limited)
/// └── /v1/
///     ├── /auth/{register,login,refresh}       # Public
///     ├── /invites/accept                      # Authenticated from here on
///     └── /workspaces[/:id]
///         ├── /members[/:membership_id]
///         ├── /invites/:membership_id/revoke
///         ├── /lists[/:list_id[/columns[/:column_id]|/items]]
///         ├── /items/:item_id[/comments]
///         ├── /comments/:comment_id
///         ├── /relationships[/:rel_id[/links]]
///         ├── /relationship-links/:link_id
///         ├── /teams[/:team_id/members[/:user_id]]
///         ├── /shares[/:share_id]
///         ├── /links
///         ├── /views[/:view_id]
///         └── /audit
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. JWT authentication (every `/v1` route outside `/v1/auth`)
/// 5. Rate limiting (`/s/:token` only)
pub fn build_router(state: AppState) -> Router {
    // Import route handlers
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    // Anonymous link resolution
    let public_routes = Router::new()
        .route("/s/:token", get(routes::shares::resolve_link))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::link_rate_limit,
        ));

    let protected_routes = Router::new()
        .route("/invites/accept", post(routes::members::accept_invite))
        .route(
            "/workspaces",
            get(routes::workspaces::list_workspaces).post(routes::workspaces::create_workspace),
        )
        .route(
            "/workspaces/:id",
            get(routes::workspaces::get_workspace)
                .patch(routes::workspaces::update_workspace)
                .delete(routes::workspaces::delete_workspace),
        )
        .route(
            "/workspaces/:id/members",
            get(routes::members::list_members).post(routes::members::invite_member),
        )
        .route(
            "/workspaces/:id/members/:membership_id",
            patch(routes::members::update_role).delete(routes::members::remove_member),
        )
        .route(
            "/workspaces/:id/invites/:membership_id/revoke",
            post(routes::members::revoke_invite),
        )
        .route(
            "/workspaces/:id/lists",
            get(routes::lists::list_lists).post(routes::lists::create_list),
        )
        .route(
            "/workspaces/:id/lists/:list_id",
            get(routes::lists::get_list)
                .patch(routes::lists::update_list)
                .delete(routes::lists::archive_list),
        )
        .route(
            "/workspaces/:id/lists/:list_id/columns",
            get(routes::lists::list_columns).post(routes::lists::create_column),
        )
        .route(
            "/workspaces/:id/lists/:list_id/columns/:column_id",
            delete(routes::lists::delete_column),
        )
        .route(
            "/workspaces/:id/lists/:list_id/items",
            get(routes::items::list_items).post(routes::items::create_item),
        )
        .route(
            "/workspaces/:id/items/:item_id",
            get(routes::items::get_item)
                .patch(routes::items::update_item)
                .delete(routes::items::archive_item),
        )
        .route(
            "/workspaces/:id/items/:item_id/comments",
            get(routes::items::list_comments).post(routes::items::create_comment),
        )
        .route(
            "/workspaces/:id/comments/:comment_id",
            delete(routes::items::delete_comment),
        )
        .route(
            "/workspaces/:id/relationships",
            get(routes::relationships::list_relationships).post(routes::relationships::create_relationship),
        )
        .route(
            "/workspaces/:id/relationships/:rel_id",
            delete(routes::relationships::delete_relationship),
        )
        .route(
            "/workspaces/:id/relationships/:rel_id/links",
            get(routes::relationships::list_links).post(routes::relationships::create_link),
        )
        .route(
            "/workspaces/:id/relationship-links/:link_id",
            delete(routes::relationships::delete_link),
        )
        .route(
            "/workspaces/:id/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/workspaces/:id/teams/:team_id/members",
            get(routes::teams::list_team_members).post(routes::teams::add_team_member),
        )
        .route(
            "/workspaces/:id/teams/:team_id/members/:user_id",
            delete(routes::teams::remove_team_member),
        )
        .route(
            "/workspaces/:id/shares",
            get(routes::shares::list_shares).post(routes::shares::create_share),
        )
        .route(
            "/workspaces/:id/shares/:share_id",
            delete(routes::shares::delete_share),
        )
        .route("/workspaces/:id/links", post(routes::shares::create_link))
        .route(
            "/workspaces/:id/views",
            get(routes::views::list_views).post(routes::views::create_view),
        )
        .route(
            "/workspaces/:id/views/:view_id",
            delete(routes::views::delete_view),
        )
        .route("/workspaces/:id/audit", get(routes::audit::list_audit))
        .route_layer(axum::middleware::from_fn(create_jwt_middleware(
            state.db.clone(),
            state.jwt_secret().to_string(),
        )));

    // Build complete v1 API
    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected_routes);

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Configure CORS based on environment
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, DatabaseConfig, JwtConfig, LinkConfig, RateLimitConfig};
    use warden_shared::mailer::MailConfig;

    fn config(origins: &[&str]) -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: origins.iter().map(|o| o.to_string()).collect(),
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
            mail: MailConfig::default(),
            links: LinkConfig {
                frontend_url: "http://localhost:3000".to_string(),
                invite_ttl_days: 7,
                link_default_ttl_days: 30,
            },
            rate_limit: RateLimitConfig {
                redis_url: None,
                link_requests_per_minute: 60,
                trusted_proxy_hops: 0,
            },
        }
    }

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _ = cors_layer(&config(&["*"]));
        let _ = cors_layer(&config(&["https://app.example.com", "not a header\n"]));
    }

    #[tokio::test]
    async fn test_state_derives_settings_from_config() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/test")
            .unwrap();
        let state = AppState::new(
            pool,
            config(&["*"]),
            Arc::new(warden_shared::mailer::LogMailer),
            None,
        );

        assert_eq!(state.invites.ttl, chrono::Duration::days(7));
        assert_eq!(state.links.default_ttl, chrono::Duration::days(30));
        assert_eq!(state.jwt_secret(), "test-secret-key-at-least-32-bytes-long");
    }

    #[tokio::test]
    async fn test_router_builds_with_jwt_layer() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/test")
            .unwrap();
        let state = AppState::new(
            pool,
            config(&["https://app.example.com"]),
            Arc::new(warden_shared::mailer::LogMailer),
            None,
        );

        // The JWT layer owns its secret, so the state can move into the router.
        let _router = build_router(state);
    }
}
