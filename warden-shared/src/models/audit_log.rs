/// Audit log: append-only record of every mutation
///
/// Each row says who (`actor_id`, `NULL` for anonymous link views) did what
/// (`action`) to which entity (`entity_type`, `entity_id`), with a structured `diff`.
///
/// # Transactional writes
///
/// [`AuditLog::record`] only accepts an open [`Transaction`]. An audit row is
/// therefore always written in the same transaction as the change it describes.
/// When that transaction rolls back, the audit row goes with it, and no audit row
/// exists for a change that never committed.
///
/// # Immutability
///
/// There is no update or delete API. The `trg_audit_logs_immutable` trigger rejects
/// `UPDATE` at the database level. Rows disappear only when their workspace is
/// deleted (`ON DELETE CASCADE`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     workspace_id UUID NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
///     actor_id UUID,
///     action TEXT NOT NULL,
///     entity_type TEXT NOT NULL,
///     entity_id UUID,
///     diff JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use warden_shared::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
/// use warden_shared::models::scope::TenantScope;
/// use serde_json::json;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, scope: TenantScope, actor: Uuid, list_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// // ... mutate the list through `&mut *tx` ...
/// AuditLog::record(
///     &mut tx,
///     &scope,
///     AuditEntry::new(Action::ListUpdate, EntityType::List, Some(list_id))
///         .actor(Some(actor))
///         .diff(json!({"name": {"old": "Leads", "new": "Deals"}})),
/// )
/// .await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

use super::scope::TenantScope;

/// Maximum page size for audit queries
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Default page size for audit queries
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Action tags written to `audit_logs.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "workspace.create")]
    WorkspaceCreate,
    #[serde(rename = "workspace.update")]
    WorkspaceUpdate,
    #[serde(rename = "membership.invite")]
    MembershipInvite,
    #[serde(rename = "membership.accept")]
    MembershipAccept,
    #[serde(rename = "membership.revoke")]
    MembershipRevoke,
    #[serde(rename = "membership.role_change")]
    MembershipRoleChange,
    #[serde(rename = "membership.remove")]
    MembershipRemove,
    #[serde(rename = "list.create")]
    ListCreate,
    #[serde(rename = "list.update")]
    ListUpdate,
    #[serde(rename = "list.delete")]
    ListDelete,
    #[serde(rename = "column.create")]
    ColumnCreate,
    #[serde(rename = "column.delete")]
    ColumnDelete,
    #[serde(rename = "item.create")]
    ItemCreate,
    #[serde(rename = "item.update")]
    ItemUpdate,
    #[serde(rename = "item.delete")]
    ItemDelete,
    #[serde(rename = "comment.create")]
    CommentCreate,
    #[serde(rename = "comment.delete")]
    CommentDelete,
    #[serde(rename = "relationship.create")]
    RelationshipCreate,
    #[serde(rename = "relationship.delete")]
    RelationshipDelete,
    #[serde(rename = "relationship.link.create")]
    RelationshipLinkCreate,
    #[serde(rename = "relationship.link.delete")]
    RelationshipLinkDelete,
    #[serde(rename = "team.create")]
    TeamCreate,
    #[serde(rename = "team.member.add")]
    TeamMemberAdd,
    #[serde(rename = "team.member.remove")]
    TeamMemberRemove,
    #[serde(rename = "share.create")]
    ShareCreate,
    #[serde(rename = "share.delete")]
    ShareDelete,
    #[serde(rename = "share.link.create")]
    ShareLinkCreate,
    #[serde(rename = "share.link.view")]
    ShareLinkView,
    #[serde(rename = "view.create")]
    ViewCreate,
    #[serde(rename = "view.delete")]
    ViewDelete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::WorkspaceCreate => "workspace.create",
            Action::WorkspaceUpdate => "workspace.update",
            Action::MembershipInvite => "membership.invite",
            Action::MembershipAccept => "membership.accept",
            Action::MembershipRevoke => "membership.revoke",
            Action::MembershipRoleChange => "membership.role_change",
            Action::MembershipRemove => "membership.remove",
            Action::ListCreate => "list.create",
            Action::ListUpdate => "list.update",
            Action::ListDelete => "list.delete",
            Action::ColumnCreate => "column.create",
            Action::ColumnDelete => "column.delete",
            Action::ItemCreate => "item.create",
            Action::ItemUpdate => "item.update",
            Action::ItemDelete => "item.delete",
            Action::CommentCreate => "comment.create",
            Action::CommentDelete => "comment.delete",
            Action::RelationshipCreate => "relationship.create",
            Action::RelationshipDelete => "relationship.delete",
            Action::RelationshipLinkCreate => "relationship.link.create",
            Action::RelationshipLinkDelete => "relationship.link.delete",
            Action::TeamCreate => "team.create",
            Action::TeamMemberAdd => "team.member.add",
            Action::TeamMemberRemove => "team.member.remove",
            Action::ShareCreate => "share.create",
            Action::ShareDelete => "share.delete",
            Action::ShareLinkCreate => "share.link.create",
            Action::ShareLinkView => "share.link.view",
            Action::ViewCreate => "view.create",
            Action::ViewDelete => "view.delete",
        }
    }
}

/// Kind of entity an audit row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Workspace,
    Membership,
    List,
    Column,
    Item,
    Comment,
    Relationship,
    RelationshipLink,
    Team,
    Share,
    View,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Workspace => "workspace",
            EntityType::Membership => "membership",
            EntityType::List => "list",
            EntityType::Column => "column",
            EntityType::Item => "item",
            EntityType::Comment => "comment",
            EntityType::Relationship => "relationship",
            EntityType::RelationshipLink => "relationship_link",
            EntityType::Team => "team",
            EntityType::Share => "share",
            EntityType::View => "view",
        }
    }
}

/// A stored audit row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub workspace_id: Uuid,

    /// `None` for anonymous actions (link views)
    pub actor_id: Option<Uuid>,

    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub diff: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for [`AuditLog::record`]
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: Action,
    pub entity_type: EntityType,
    pub entity_id: Option<Uuid>,
    pub diff: JsonValue,
}

impl AuditEntry {
    /// Starts an anonymous entry with an empty diff
    pub fn new(action: Action, entity_type: EntityType, entity_id: Option<Uuid>) -> Self {
        Self {
            actor_id: None,
            action,
            entity_type,
            entity_id,
            diff: JsonValue::Object(Default::default()),
        }
    }

    pub fn actor(mut self, actor_id: Option<Uuid>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn diff(mut self, diff: JsonValue) -> Self {
        self.diff = diff;
        self
    }
}

impl AuditLog {
    /// Appends an audit row inside the caller's transaction
    pub async fn record(
        tx: &mut Transaction<'_, Postgres>,
        scope: &TenantScope,
        entry: AuditEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (workspace_id, actor_id, action, entity_type, entity_id, diff)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, workspace_id, actor_id, action, entity_type, entity_id, diff, created_at
            "#,
        )
        .bind(scope.workspace_id())
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(entry.diff)
        .fetch_one(&mut **tx)
        .await
    }

    /// Lists a workspace's audit rows, newest first
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE` and `offset` to `>= 0`. Ties on
    /// `created_at` (rows from one transaction share `NOW()`) are broken by id so
    /// pages do not overlap.
    pub async fn list<'e, E>(
        executor: E,
        scope: &TenantScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, workspace_id, actor_id, action, entity_type, entity_id, diff, created_at
            FROM audit_logs
            WHERE workspace_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(scope.workspace_id())
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .bind(offset.max(0))
        .fetch_all(executor)
        .await
    }

    /// Counts a workspace's audit rows for one action
    pub async fn count_action<'e, E>(
        executor: E,
        scope: &TenantScope,
        action: Action,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM audit_logs WHERE workspace_id = $1 AND action = $2",
        )
        .bind(scope.workspace_id())
        .bind(action.as_str())
        .fetch_one(executor)
        .await
    }
}
