/// Relationships between lists and the links between their items
///
/// A relationship declares that items of `list_id` may point at items of
/// `target_list_id`. Links are the concrete pairs. For `one_to_many` relationships
/// a target item may be linked from at most one source item; the engine checks this
/// while holding the relationship row lock.
///
/// Links are inserted with `INSERT ... SELECT` joining the relationship and both
/// items inside the scope's workspace. A link therefore only exists when the source
/// item belongs to the relationship's source list and the target item to its target
/// list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::scope::TenantScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "relationship_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    OneToMany,
    ManyToMany,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::OneToMany => "one_to_many",
            RelationshipType::ManyToMany => "many_to_many",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relationship {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub list_id: Uuid,
    pub target_list_id: Uuid,
    pub name: String,
    pub relationship_type: RelationshipType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub list_id: Uuid,
    pub target_list_id: Uuid,
    pub name: String,
    pub relationship_type: RelationshipType,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelationshipLink {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub relationship_id: Uuid,
    pub source_item_id: Uuid,
    pub target_item_id: Uuid,
    pub created_at: DateTime<Utc>,
}

const RELATIONSHIP_COLUMNS: &str =
    "id, workspace_id, list_id, target_list_id, name, relationship_type, created_at, updated_at";

const LINK_COLUMNS: &str =
    "id, workspace_id, relationship_id, source_item_id, target_item_id, created_at";

impl Relationship {
    /// Creates a relationship between two live lists of the workspace
    ///
    /// Returns `None` when either list is not in scope.
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        data: NewRelationship,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Relationship>(&format!(
            r#"
            INSERT INTO relationships (workspace_id, list_id, target_list_id, name, relationship_type)
            SELECT s.workspace_id, s.id, t.id, $4, $5
            FROM lists s
            JOIN lists t ON t.id = $2 AND t.workspace_id = s.workspace_id AND t.archived_at IS NULL
            WHERE s.id = $1 AND s.workspace_id = $3 AND s.archived_at IS NULL
            RETURNING {RELATIONSHIP_COLUMNS}
            "#
        ))
        .bind(data.list_id)
        .bind(data.target_list_id)
        .bind(scope.workspace_id())
        .bind(data.name)
        .bind(data.relationship_type)
        .fetch_optional(executor)
        .await
    }

    /// Loads a relationship and locks it; link creation serializes on this lock
    pub async fn find_for_update(
        conn: &mut PgConnection,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Relationship>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM relationships
            WHERE id = $1 AND workspace_id = $2
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(conn)
        .await
    }

    pub async fn find<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Relationship>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM relationships
            WHERE id = $1 AND workspace_id = $2
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Relationships of the workspace, optionally only those whose source is `list_id`
    pub async fn list<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Relationship>(&format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM relationships
            WHERE workspace_id = $1 AND ($2::uuid IS NULL OR list_id = $2)
            ORDER BY created_at
            "#
        ))
        .bind(scope.workspace_id())
        .bind(list_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Relationship>(&format!(
            r#"
            DELETE FROM relationships
            WHERE id = $1 AND workspace_id = $2
            RETURNING {RELATIONSHIP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }
}

impl RelationshipLink {
    /// Links two live items through a relationship of the workspace
    ///
    /// Returns `None` when the relationship is not in scope, or when either item is
    /// not a live item of the list on its side of the relationship.
    ///
    /// # Errors
    ///
    /// A duplicate pair trips `uq_relationship_link`.
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        relationship_id: Uuid,
        source_item_id: Uuid,
        target_item_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RelationshipLink>(&format!(
            r#"
            INSERT INTO relationship_links (workspace_id, relationship_id, source_item_id, target_item_id)
            SELECT r.workspace_id, r.id, s.id, t.id
            FROM relationships r
            JOIN items s ON s.id = $2 AND s.list_id = r.list_id
                        AND s.workspace_id = r.workspace_id AND s.archived_at IS NULL
            JOIN items t ON t.id = $3 AND t.list_id = r.target_list_id
                        AND t.workspace_id = r.workspace_id AND t.archived_at IS NULL
            WHERE r.id = $1 AND r.workspace_id = $4
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(relationship_id)
        .bind(source_item_id)
        .bind(target_item_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Whether a target item already has a source in this relationship
    pub async fn target_is_linked<'e, E>(
        executor: E,
        scope: &TenantScope,
        relationship_id: Uuid,
        target_item_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM relationship_links
                WHERE relationship_id = $1 AND target_item_id = $2 AND workspace_id = $3
            )
            "#,
        )
        .bind(relationship_id)
        .bind(target_item_id)
        .bind(scope.workspace_id())
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_relationship<'e, E>(
        executor: E,
        scope: &TenantScope,
        relationship_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RelationshipLink>(&format!(
            r#"
            SELECT {LINK_COLUMNS}
            FROM relationship_links
            WHERE relationship_id = $1 AND workspace_id = $2
            ORDER BY created_at
            "#
        ))
        .bind(relationship_id)
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, RelationshipLink>(&format!(
            r#"
            DELETE FROM relationship_links
            WHERE id = $1 AND workspace_id = $2
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }
}
