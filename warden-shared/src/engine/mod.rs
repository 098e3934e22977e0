/// Access-control engine and the audited operations built on it
///
/// Every operation follows the same shape:
///
/// 1. [`access::authorize`] (or [`access::authorize_resource`]) turns the caller's
///    identity plus a workspace id into a [`TenantScope`](crate::models::scope::TenantScope),
///    or fails.
/// 2. A transaction is opened, rows are locked where an invariant needs it, and the
///    mutation runs through tenant-scoped model queries.
/// 3. The audit row is written through the same transaction, which then commits.
///
/// Side effects that must not undo a committed change (invite e-mails) run after
/// the commit.
///
/// # Modules
///
/// - [`access`]: authentication, membership and share checks
/// - [`identity`]: registration and login
/// - [`workspaces`]: workspace lifecycle
/// - [`members`]: invites, acceptance, role changes, removal
/// - [`resources`]: lists, columns, items and comments
/// - [`relationships`]: relationships and item links
/// - [`teams`]: teams and their members
/// - [`views`]: saved views
/// - [`sharing`]: user/team shares and anonymous link shares
/// - [`audit`]: audit log reads

pub mod access;
pub mod audit;
pub mod identity;
pub mod members;
pub mod relationships;
pub mod resources;
pub mod sharing;
pub mod teams;
pub mod views;
pub mod workspaces;

use thiserror::Error;

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;

/// Result type of every engine operation
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine failures
///
/// Each variant maps onto one fixed HTTP status at the API boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing, malformed, expired or revoked credential; never says which
    #[error("Invalid or missing credentials")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    /// Absent, or outside the caller's tenant; the two are indistinguishable
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Link expired")]
    Expired,

    #[error("Link expired (max views)")]
    QuotaExceeded,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl EngineError {
    pub fn not_found(what: &str) -> Self {
        EngineError::NotFound(format!("{what} not found"))
    }

    pub fn forbidden() -> Self {
        EngineError::Forbidden("Insufficient permissions".to_string())
    }
}

/// Maps unique violations onto `Conflict` by constraint name
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let message = conflict_message(db_err.constraint().unwrap_or_default());
                return EngineError::Conflict(message.to_string());
            }
        }

        EngineError::Database(err)
    }
}

fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "uq_memberships_pending_email" => "User has already been invited",
        "uq_memberships_accepted_user" => "User is already a member of this workspace",
        "uq_relationship_link" => "Link already exists",
        "uq_list_column_key" => "A column with this key already exists",
        "uq_shares_user_grant" | "uq_shares_team_grant" => "Share already exists",
        "uq_teams_workspace_name" => "A team with this name already exists",
        "uq_users_email" => "Email already registered",
        "team_members_pkey" => "User is already in this team",
        _ => "Resource already exists",
    }
}

impl From<JwtError> for EngineError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => EngineError::Internal(msg),
            _ => EngineError::Unauthenticated,
        }
    }
}

impl From<PasswordError> for EngineError {
    fn from(err: PasswordError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages_by_constraint() {
        assert_eq!(
            conflict_message("uq_memberships_pending_email"),
            "User has already been invited"
        );
        assert_eq!(
            conflict_message("uq_memberships_accepted_user"),
            "User is already a member of this workspace"
        );
        assert_eq!(conflict_message("uq_relationship_link"), "Link already exists");
        assert_eq!(conflict_message("something_else"), "Resource already exists");
    }

    #[test]
    fn test_jwt_failures_are_unauthenticated() {
        assert!(matches!(
            EngineError::from(JwtError::Expired),
            EngineError::Unauthenticated
        ));
        assert!(matches!(
            EngineError::from(JwtError::Invalid("bad signature".into())),
            EngineError::Unauthenticated
        ));
        assert!(matches!(
            EngineError::from(JwtError::CreateError("key".into())),
            EngineError::Internal(_)
        ));
    }

    #[test]
    fn test_link_errors_keep_distinct_messages() {
        assert_eq!(EngineError::Expired.to_string(), "Link expired");
        assert_eq!(EngineError::QuotaExceeded.to_string(), "Link expired (max views)");
    }

    #[test]
    fn test_non_unique_database_errors_pass_through() {
        assert!(matches!(
            EngineError::from(sqlx::Error::RowNotFound),
            EngineError::Database(sqlx::Error::RowNotFound)
        ));
    }
}
