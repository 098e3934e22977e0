/// Authentication middleware for Axum
///
/// The middleware reads `Authorization: Bearer <token>`, resolves it to an active
/// user through [`authenticate`], and stores the resulting [`Actor`] in the request
/// extensions. Handlers take the `Actor` as an extractor.
///
/// Every credential failure produces the same 401 body, so a caller cannot tell an
/// expired token from a forged one or from a deactivated account.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use warden_shared::auth::middleware::create_jwt_middleware;
/// use warden_shared::engine::access::Actor;
/// use sqlx::PgPool;
///
/// async fn whoami(actor: Actor) -> String {
///     actor.email
/// }
///
/// fn router(pool: PgPool) -> Router {
///     Router::new()
///         .route("/me", get(whoami))
///         .layer(middleware::from_fn(create_jwt_middleware(pool, "secret".to_string())))
/// }
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, error};

use crate::engine::access::{authenticate, Actor};
use crate::engine::EngineError;

const UNAUTHENTICATED_MESSAGE: &str = "Invalid or missing credentials";

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat,

    /// Token rejected, or its user is missing or inactive
    InvalidToken,

    /// Database error while loading the user
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidFormat | AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized", "message": UNAUTHENTICATED_MESSAGE })),
            )
                .into_response(),
            AuthError::DatabaseError(msg) => {
                error!(error = %msg, "Authentication lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal_error", "message": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<EngineError> for AuthError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Database(e) => AuthError::DatabaseError(e.to_string()),
            EngineError::Internal(msg) => AuthError::DatabaseError(msg),
            _ => AuthError::InvalidToken,
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

/// JWT authentication middleware
///
/// Adds the authenticated [`Actor`] to the request extensions.
///
/// # Errors
///
/// 401 when the header is missing or malformed, the token fails validation, or the
/// token's user is unknown or inactive. 500 on a database failure.
pub async fn jwt_auth_middleware(
    pool: PgPool,
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let actor = authenticate(&pool, &secret, token).await?;

    debug!(user_id = %actor.user_id, "Request authenticated");
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Creates a JWT authentication middleware closure
///
/// Captures the pool and secret for use with `axum::middleware::from_fn`.
pub fn create_jwt_middleware(
    pool: PgPool,
    secret: String,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    move |req, next| {
        let pool = pool.clone();
        let secret = secret.clone();
        Box::pin(jwt_auth_middleware(pool, secret, req, next))
    }
}

/// Handlers behind [`jwt_auth_middleware`] receive the caller as an extractor
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingCredentials)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::InvalidFormat.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::DatabaseError("down".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_engine_errors_collapse_to_invalid_token() {
        assert!(matches!(
            AuthError::from(EngineError::Unauthenticated),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(EngineError::Database(sqlx::Error::PoolTimedOut)),
            AuthError::DatabaseError(_)
        ));
    }

    #[tokio::test]
    async fn test_actor_extractor_requires_extension() {
        let (mut parts, _) = Request::new(axum::body::Body::empty()).into_parts();
        assert!(Actor::from_request_parts(&mut parts, &()).await.is_err());

        let actor = Actor {
            user_id: uuid::Uuid::new_v4(),
            email: "ada@example.com".to_string(),
        };
        parts.extensions.insert(actor.clone());
        assert_eq!(Actor::from_request_parts(&mut parts, &()).await.unwrap(), actor);
    }
}
