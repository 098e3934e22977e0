/// Workspace memberships and their lifecycle states
///
/// A membership row binds either a user or a pending e-mail address to a workspace
/// with a role. Invites are memberships in the `invited` state that carry the hash of
/// a one-time token. Accepting binds the user and moves the row to `accepted`.
/// Revoking an invite moves it to `revoked`, which is terminal.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE workspace_role AS ENUM ('owner', 'admin', 'editor', 'member');
/// CREATE TYPE membership_status AS ENUM ('invited', 'accepted', 'revoked');
///
/// CREATE TABLE workspace_memberships (
///     id UUID PRIMARY KEY,
///     workspace_id UUID NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
///     user_id UUID REFERENCES users(id) ON DELETE CASCADE,
///     role workspace_role NOT NULL,
///     status membership_status NOT NULL,
///     invite_email TEXT,
///     invite_token_hash TEXT,      -- unique when present
///     ...
/// );
/// -- one accepted row per (workspace, user), one pending invite per (workspace, email)
/// ```
///
/// # Roles
///
/// Roles are ordered `owner ⊇ admin ⊇ editor ⊇ member`. Operations do not ask for a
/// minimum role; they name the exact set they accept (see [`Role::EDITORS`] and
/// friends), which keeps one-off rules such as "only owners delete a workspace"
/// visible at the call site.
///
/// Every query here filters on the workspace. [`Membership::find_accepted`] and
/// [`Membership::create_owner`] take a raw workspace id because they run before a
/// scope exists (authorization itself, and workspace creation); everything else
/// takes a [`TenantScope`]. Lookups by membership id alone do not exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::scope::TenantScope;

/// Role of a member within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workspace_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including deleting the workspace and managing owners
    Owner,

    /// Manages members, invites, teams and shares
    Admin,

    /// Creates and edits resources, issues links
    Editor,

    /// Reads resources and comments on them
    Member,
}

impl Role {
    /// Every role; used by read paths
    pub const ALL: &'static [Role] = &[Role::Owner, Role::Admin, Role::Editor, Role::Member];

    /// Roles allowed to write resources and create shares
    pub const EDITORS: &'static [Role] = &[Role::Owner, Role::Admin, Role::Editor];

    /// Roles allowed to manage membership, teams and share deletion
    pub const MANAGERS: &'static [Role] = &[Role::Owner, Role::Admin];

    /// Owner-only operations
    pub const OWNERS: &'static [Role] = &[Role::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// True when this role carries every permission of `other`
    pub fn includes(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }

    /// Every role that includes `min`, highest first
    pub fn at_least(min: Role) -> Vec<Role> {
        Role::ALL.iter().copied().filter(|role| role.includes(min)).collect()
    }

    pub fn is_in(&self, allowed: &[Role]) -> bool {
        allowed.contains(self)
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Editor => 2,
            Role::Member => 1,
        }
    }
}

/// Lifecycle state of a membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Invited,
    Accepted,
    Revoked,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Invited => "invited",
            MembershipStatus::Accepted => "accepted",
            MembershipStatus::Revoked => "revoked",
        }
    }
}

/// A membership or pending invite
///
/// The invite token hash is never loaded into this struct. Only the display prefix
/// is, so a serialized membership cannot leak a usable token.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: Role,
    pub status: MembershipStatus,
    pub invite_email: Option<String>,
    pub invite_token_prefix: Option<String>,
    pub invited_by: Option<Uuid>,
    pub invited_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pending invite
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub email: String,
    pub role: Role,
    pub token_hash: String,
    pub token_prefix: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Member listing row with the user's e-mail resolved
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberSummary {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub status: MembershipStatus,
    pub invited_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str = "id, workspace_id, user_id, role, status, invite_email, invite_token_prefix, \
                       invited_by, invited_at, expires_at, accepted_at, revoked_at, created_at, updated_at";

impl Membership {
    /// Inserts the accepted owner membership of a freshly created workspace
    pub async fn create_owner<'e, E>(
        executor: E,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            INSERT INTO workspace_memberships (workspace_id, user_id, role, status, accepted_at)
            VALUES ($1, $2, 'owner', 'accepted', NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Inserts a pending invite
    ///
    /// # Errors
    ///
    /// A concurrent invite for the same address trips the
    /// `uq_memberships_pending_email` unique index.
    pub async fn create_invite<'e, E>(
        executor: E,
        scope: &TenantScope,
        data: NewInvite,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            INSERT INTO workspace_memberships (
                workspace_id, role, status, invite_email, invite_token_hash,
                invite_token_prefix, invited_by, invited_at, expires_at
            )
            VALUES ($1, $2, 'invited', $3, $4, $5, $6, NOW(), $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(scope.workspace_id())
        .bind(data.role)
        .bind(data.email)
        .bind(data.token_hash)
        .bind(data.token_prefix)
        .bind(data.invited_by)
        .bind(data.expires_at)
        .fetch_one(executor)
        .await
    }

    /// Finds the caller's accepted membership in a workspace
    pub async fn find_accepted<'e, E>(
        executor: E,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM workspace_memberships
            WHERE workspace_id = $1 AND user_id = $2 AND status = 'accepted'
            "#
        ))
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Loads a membership of the workspace and locks it for the rest of the transaction
    pub async fn find_for_update(
        conn: &mut PgConnection,
        scope: &TenantScope,
        membership_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM workspace_memberships
            WHERE id = $1 AND workspace_id = $2
            FOR UPDATE
            "#
        ))
        .bind(membership_id)
        .bind(scope.workspace_id())
        .fetch_optional(conn)
        .await
    }

    /// Finds a live (invited or accepted) membership for an e-mail address
    ///
    /// Matches both pending invites addressed to `email` and accepted members whose
    /// user account has that e-mail. Accepted rows sort first.
    pub async fn find_live_for_email<'e, E>(
        executor: E,
        scope: &TenantScope,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT m.id, m.workspace_id, m.user_id, m.role, m.status, m.invite_email,
                   m.invite_token_prefix, m.invited_by, m.invited_at, m.expires_at,
                   m.accepted_at, m.revoked_at, m.created_at, m.updated_at
            FROM workspace_memberships m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = $1
              AND m.status IN ('invited', 'accepted')
              AND (LOWER(m.invite_email) = LOWER($2) OR LOWER(u.email) = LOWER($2))
            ORDER BY (m.status = 'accepted') DESC
            LIMIT 1
            "#,
        )
        .bind(scope.workspace_id())
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// Consumes an invite token
    ///
    /// The state check, expiry check and transition happen in one conditional
    /// UPDATE, so two concurrent acceptances of the same token cannot both succeed.
    /// Returns `None` for an unknown, already used, revoked or expired token.
    pub async fn accept<'e, E>(
        executor: E,
        token_hash: &str,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            UPDATE workspace_memberships
            SET user_id = $2,
                status = 'accepted',
                accepted_at = NOW(),
                updated_at = NOW()
            WHERE invite_token_hash = $1
              AND status = 'invited'
              AND (expires_at IS NULL OR expires_at > NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(token_hash)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Moves a pending invite of the workspace to `revoked`
    ///
    /// Returns `None` when the row does not exist in this workspace or is no longer
    /// `invited`.
    pub async fn revoke_invite<'e, E>(
        executor: E,
        scope: &TenantScope,
        membership_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            UPDATE workspace_memberships
            SET status = 'revoked', revoked_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2 AND status = 'invited'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(membership_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Locks every accepted owner row of the workspace and returns their ids
    ///
    /// Callers about to demote or remove an owner take this lock first. Two
    /// concurrent demotions then serialize, and the second one sees the first one's
    /// result when it counts the remaining owners.
    pub async fn lock_accepted_owners(
        conn: &mut PgConnection,
        scope: &TenantScope,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM workspace_memberships
            WHERE workspace_id = $1 AND role = 'owner' AND status = 'accepted'
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(scope.workspace_id())
        .fetch_all(conn)
        .await
    }

    /// Changes the role of a membership in the workspace
    pub async fn set_role<'e, E>(
        executor: E,
        scope: &TenantScope,
        membership_id: Uuid,
        role: Role,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            UPDATE workspace_memberships
            SET role = $3, updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(membership_id)
        .bind(scope.workspace_id())
        .bind(role)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a membership row of the workspace
    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        membership_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM workspace_memberships
            WHERE id = $1 AND workspace_id = $2
            "#,
        )
        .bind(membership_id)
        .bind(scope.workspace_id())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists accepted members and pending invites, owners first
    pub async fn list_by_workspace<'e, E>(
        executor: E,
        scope: &TenantScope,
    ) -> Result<Vec<MemberSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT m.id, m.user_id, COALESCE(u.email, m.invite_email) AS email, u.name,
                   m.role, m.status, m.invited_at, m.expires_at, m.accepted_at
            FROM workspace_memberships m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = $1 AND m.status IN ('invited', 'accepted')
            ORDER BY m.role, m.created_at
            "#,
        )
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }

    /// Whether the invite behind this row has been accepted
    pub fn is_accepted(&self) -> bool {
        self.status == MembershipStatus::Accepted
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner && self.is_accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Some(*role));
        }
        assert_eq!(Role::from_str("viewer"), None);
        assert_eq!(Role::from_str("Owner"), None);
    }

    #[test]
    fn test_role_ordering_is_inclusive() {
        assert!(Role::Owner.includes(Role::Admin));
        assert!(Role::Admin.includes(Role::Editor));
        assert!(Role::Editor.includes(Role::Member));
        assert!(Role::Member.includes(Role::Member));
        assert!(!Role::Member.includes(Role::Editor));
        assert!(!Role::Admin.includes(Role::Owner));
    }

    #[test]
    fn test_named_role_sets_match_ordering() {
        assert_eq!(Role::at_least(Role::Member), Role::ALL.to_vec());
        assert_eq!(Role::at_least(Role::Editor), Role::EDITORS.to_vec());
        assert_eq!(Role::at_least(Role::Admin), Role::MANAGERS.to_vec());
        assert_eq!(Role::at_least(Role::Owner), Role::OWNERS.to_vec());
    }

    #[test]
    fn test_is_in_uses_explicit_set() {
        assert!(Role::Owner.is_in(Role::OWNERS));
        assert!(!Role::Admin.is_in(Role::OWNERS));
        assert!(Role::Editor.is_in(Role::EDITORS));
        assert!(!Role::Member.is_in(Role::EDITORS));
        assert!(Role::Member.is_in(Role::ALL));
        assert!(!Role::Owner.is_in(&[]));
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(MembershipStatus::Invited.as_str(), "invited");
        assert_eq!(MembershipStatus::Accepted.as_str(), "accepted");
        assert_eq!(MembershipStatus::Revoked.as_str(), "revoked");
    }
}
