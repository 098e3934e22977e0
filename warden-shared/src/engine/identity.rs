/// Registration, login and token refresh
///
/// Registration can create the user's first workspace in the same transaction, so a
/// new account either ends up owning a workspace or nothing is written at all.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{workspaces, EngineError, EngineResult};
use crate::auth::jwt::{create_token, validate_refresh_token, Claims, TokenType};
use crate::auth::password::{hash_password, validate_password_strength, verify_against_dummy, verify_password};
use crate::models::user::{normalize_email, CreateUser, User};
use crate::models::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,

    /// Creates a workspace owned by the new user when set
    pub workspace_name: Option<String>,
}

/// Issued tokens plus the user they belong to
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Workspace>,
}

pub async fn register(pool: &PgPool, secret: &str, data: Registration) -> EngineResult<Session> {
    validate_password_strength(&data.password).map_err(EngineError::Validation)?;

    let email = normalize_email(&data.email);
    let password_hash = hash_password(&data.password)?;

    let mut tx = pool.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email,
            password_hash,
            name: data.name,
        },
    )
    .await?;

    let workspace = match data.workspace_name.as_deref() {
        Some(name) => Some(workspaces::create_in_tx(&mut tx, user.id, name, serde_json::json!({})).await?),
        None => None,
    };

    tx.commit().await?;

    info!(user_id = %user.id, with_workspace = workspace.is_some(), "User registered");

    session_for(user, workspace, secret)
}

/// Verifies e-mail and password
///
/// Unknown e-mail, wrong password and inactive account all fail the same way, and
/// an unknown e-mail still pays for one Argon2 verification.
pub async fn login(pool: &PgPool, secret: &str, email: &str, password: &str) -> EngineResult<Session> {
    let Some(user) = User::find_by_email(pool, email).await? else {
        let _ = verify_against_dummy(password);
        return Err(EngineError::Unauthenticated);
    };

    if !verify_password(password, &user.password_hash)? || !user.is_active {
        warn!(user_id = %user.id, "Failed login");
        return Err(EngineError::Unauthenticated);
    }

    User::update_last_login(pool, user.id).await?;
    info!(user_id = %user.id, "User logged in");

    session_for(user, None, secret)
}

/// Exchanges a refresh token for a new access token
///
/// The user is reloaded so deactivated accounts cannot keep refreshing.
pub async fn refresh(pool: &PgPool, secret: &str, refresh_token: &str) -> EngineResult<String> {
    let claims = validate_refresh_token(refresh_token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or(EngineError::Unauthenticated)?;

    Ok(create_token(
        &Claims::new(user.id, user.email, TokenType::Access),
        secret,
    )?)
}

fn session_for(user: User, workspace: Option<Workspace>, secret: &str) -> EngineResult<Session> {
    let access_token = create_token(&Claims::new(user.id, &user.email, TokenType::Access), secret)?;
    let refresh_token = create_token(&Claims::new(user.id, &user.email, TokenType::Refresh), secret)?;

    Ok(Session {
        user,
        access_token,
        refresh_token,
        expires_in: TokenType::Access.default_expiration().num_seconds(),
        workspace,
    })
}
