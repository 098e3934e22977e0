/// Resource shares: per-resource grants to users, teams and anonymous links
///
/// A share grants a role on one list or item. User and team grants extend access to
/// people who are not workspace members. Link shares carry a hashed capability
/// token and an optional expiry and view quota.
///
/// # View quota
///
/// `view_count` only moves through [`ResourceShare::consume_view`], a conditional
/// UPDATE that never takes the count past `max_views`. The table additionally has a
/// `CHECK (view_count <= max_views)`, so no code path can overshoot.
///
/// # Token storage
///
/// Only the SHA-256 of a link token is stored. The plaintext is returned once, from
/// [`engine::sharing::create_link`](crate::engine::sharing::create_link), and
/// `link_token_hash` is never loaded into [`ResourceShare`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::scope::TenantScope;

/// Kind of resource a share points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    List,
    Item,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::List => "list",
            ResourceType::Item => "item",
        }
    }
}

/// Role granted by a share
///
/// Ordered `editor ⊇ commenter ⊇ viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Viewer,
    Commenter,
    Editor,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Viewer => "viewer",
            ShareRole::Commenter => "commenter",
            ShareRole::Editor => "editor",
        }
    }

    pub fn includes(&self, other: ShareRole) -> bool {
        self.rank() >= other.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            ShareRole::Viewer => 1,
            ShareRole::Commenter => 2,
            ShareRole::Editor => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "grantee_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GranteeType {
    User,
    Team,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceShare {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub grantee_type: GranteeType,
    pub grantee_user_id: Option<Uuid>,
    pub grantee_team_id: Option<Uuid>,
    pub role: ShareRole,

    /// First characters of the link token, for display
    pub link_token_prefix: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
    pub view_count: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Who a user/team share is granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grantee {
    User(Uuid),
    Team(Uuid),
}

/// Input for a user or team grant
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub grantee: Grantee,
    pub role: ShareRole,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

/// Input for a link share
#[derive(Debug, Clone)]
pub struct NewLink {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub role: ShareRole,
    pub token_hash: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
    pub created_by: Uuid,
}

/// Whether a link can still be resolved at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Usable,
    Expired,
    Exhausted,
}

const COLUMNS: &str = "id, workspace_id, resource_type, resource_id, grantee_type, grantee_user_id, \
                       grantee_team_id, role, link_token_prefix, expires_at, max_views, view_count, \
                       created_by, created_at";

impl ResourceShare {
    /// Inserts a user or team grant
    ///
    /// # Errors
    ///
    /// A second grant for the same grantee on the same resource trips
    /// `uq_shares_user_grant` / `uq_shares_team_grant`.
    pub async fn create_grant<'e, E>(
        executor: E,
        scope: &TenantScope,
        data: NewGrant,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (grantee_type, user_id, team_id) = match data.grantee {
            Grantee::User(id) => (GranteeType::User, Some(id), None),
            Grantee::Team(id) => (GranteeType::Team, None, Some(id)),
        };

        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            INSERT INTO resource_shares (
                workspace_id, resource_type, resource_id, grantee_type,
                grantee_user_id, grantee_team_id, role, expires_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(scope.workspace_id())
        .bind(data.resource_type)
        .bind(data.resource_id)
        .bind(grantee_type)
        .bind(user_id)
        .bind(team_id)
        .bind(data.role)
        .bind(data.expires_at)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    /// Inserts a link share
    pub async fn create_link<'e, E>(
        executor: E,
        scope: &TenantScope,
        data: NewLink,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            INSERT INTO resource_shares (
                workspace_id, resource_type, resource_id, grantee_type, role,
                link_token_hash, link_token_prefix, expires_at, max_views, created_by
            )
            VALUES ($1, $2, $3, 'link', $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(scope.workspace_id())
        .bind(data.resource_type)
        .bind(data.resource_id)
        .bind(data.role)
        .bind(data.token_hash)
        .bind(data.token_prefix)
        .bind(data.expires_at)
        .bind(data.max_views)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    /// Loads a link share by token hash and locks it
    ///
    /// This is the only lookup that is not tenant-scoped: the token itself is the
    /// credential, and the workspace comes from the row it finds.
    pub async fn find_link_for_update(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM resource_shares
            WHERE link_token_hash = $1 AND grantee_type = 'link'
            FOR UPDATE
            "#
        ))
        .bind(token_hash)
        .fetch_optional(conn)
        .await
    }

    /// Counts one view against the link's quota
    ///
    /// Returns the new `view_count`, or `None` when the quota is already spent.
    pub async fn consume_view(
        conn: &mut PgConnection,
        share_id: Uuid,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE resource_shares
            SET view_count = view_count + 1
            WHERE id = $1
              AND grantee_type = 'link'
              AND (max_views IS NULL OR view_count < max_views)
            RETURNING view_count
            "#,
        )
        .bind(share_id)
        .fetch_optional(conn)
        .await
    }

    /// Highest unexpired role granted to the user on a resource, directly or via a team
    pub async fn best_role_for_user<'e, E>(
        executor: E,
        scope: &TenantScope,
        resource_type: ResourceType,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ShareRole>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let roles = sqlx::query_scalar::<_, ShareRole>(
            r#"
            SELECT s.role
            FROM resource_shares s
            WHERE s.workspace_id = $1
              AND s.resource_type = $2
              AND s.resource_id = $3
              AND (s.expires_at IS NULL OR s.expires_at > NOW())
              AND (
                  (s.grantee_type = 'user' AND s.grantee_user_id = $4)
                  OR (s.grantee_type = 'team' AND EXISTS (
                      SELECT 1 FROM team_members tm
                      WHERE tm.team_id = s.grantee_team_id
                        AND tm.user_id = $4
                        AND tm.workspace_id = $1
                  ))
              )
            "#,
        )
        .bind(scope.workspace_id())
        .bind(resource_type)
        .bind(resource_id)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(roles.into_iter().max_by_key(|role| role.rank()))
    }

    pub async fn find<'e, E>(
        executor: E,
        scope: &TenantScope,
        share_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM resource_shares
            WHERE id = $1 AND workspace_id = $2
            "#
        ))
        .bind(share_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Lists shares of the workspace, optionally narrowed to one resource
    pub async fn list<'e, E>(
        executor: E,
        scope: &TenantScope,
        resource: Option<(ResourceType, Uuid)>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (resource_type, resource_id) = resource.unzip();

        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM resource_shares
            WHERE workspace_id = $1
              AND ($2::resource_type IS NULL OR resource_type = $2)
              AND ($3::uuid IS NULL OR resource_id = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(scope.workspace_id())
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        share_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ResourceShare>(&format!(
            r#"
            DELETE FROM resource_shares
            WHERE id = $1 AND workspace_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(share_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Removes every share pointing at a resource
    ///
    /// Shares reference resources polymorphically, so there is no foreign key to
    /// cascade from. Resource deletions call this in the same transaction.
    pub async fn delete_for_resource<'e, E>(
        executor: E,
        scope: &TenantScope,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_shares
            WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3
            "#,
        )
        .bind(scope.workspace_id())
        .bind(resource_type)
        .bind(resource_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Expiry and quota state of a link at `now`
    ///
    /// Expiry wins over quota: an expired link reports `Expired` even when its
    /// views are also spent.
    pub fn link_state(&self, now: DateTime<Utc>) -> LinkState {
        if matches!(self.expires_at, Some(expires_at) if now >= expires_at) {
            return LinkState::Expired;
        }

        if matches!(self.max_views, Some(max) if self.view_count >= max) {
            return LinkState::Exhausted;
        }

        LinkState::Usable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(expires_at: Option<DateTime<Utc>>, max_views: Option<i32>, view_count: i32) -> ResourceShare {
        ResourceShare {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            resource_type: ResourceType::List,
            resource_id: Uuid::new_v4(),
            grantee_type: GranteeType::Link,
            grantee_user_id: None,
            grantee_team_id: None,
            role: ShareRole::Viewer,
            link_token_prefix: Some("shr_AbCd".to_string()),
            expires_at,
            max_views,
            view_count,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_share_role_ordering() {
        assert!(ShareRole::Editor.includes(ShareRole::Commenter));
        assert!(ShareRole::Commenter.includes(ShareRole::Viewer));
        assert!(ShareRole::Viewer.includes(ShareRole::Viewer));
        assert!(!ShareRole::Viewer.includes(ShareRole::Commenter));
    }

    #[test]
    fn test_unbounded_link_is_usable() {
        assert_eq!(link(None, None, 10_000).link_state(Utc::now()), LinkState::Usable);
    }

    #[test]
    fn test_link_expires_at_exact_instant() {
        let now = Utc::now();
        let share = link(Some(now), None, 0);

        assert_eq!(share.link_state(now - Duration::seconds(1)), LinkState::Usable);
        assert_eq!(share.link_state(now), LinkState::Expired);
    }

    #[test]
    fn test_link_exhausted_at_quota() {
        let now = Utc::now();

        assert_eq!(link(None, Some(3), 2).link_state(now), LinkState::Usable);
        assert_eq!(link(None, Some(3), 3).link_state(now), LinkState::Exhausted);
    }

    #[test]
    fn test_expiry_reported_before_quota() {
        let now = Utc::now();
        let share = link(Some(now - Duration::hours(1)), Some(1), 1);
        assert_eq!(share.link_state(now), LinkState::Expired);
    }

    #[test]
    fn test_hash_is_never_serialized() {
        let json = serde_json::to_value(link(None, Some(5), 0)).unwrap();
        assert!(json.get("link_token_hash").is_none());
        assert_eq!(json["grantee_type"], "link");
        assert_eq!(json["resource_type"], "list");
    }
}
