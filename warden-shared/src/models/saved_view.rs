/// Saved views: named filter and column presets
///
/// A view belongs to its workspace rather than to the member who saved it, so every
/// member sees the same set. `resource_type` is a free-form tag chosen by the client
/// (for example `items`); the engine only trims it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::scope::TenantScope;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedView {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub created_by: Option<Uuid>,
    pub name: String,
    pub resource_type: String,
    pub filters: JsonValue,
    pub columns: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSavedView {
    pub name: String,
    pub resource_type: String,
    pub filters: Map<String, JsonValue>,
    pub columns: Map<String, JsonValue>,
}

impl SavedView {
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        view: &NewSavedView,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SavedView>(
            r#"
            INSERT INTO saved_views (workspace_id, created_by, name, resource_type, filters, columns)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, workspace_id, created_by, name, resource_type, filters, columns, created_at
            "#,
        )
        .bind(scope.workspace_id())
        .bind(created_by)
        .bind(&view.name)
        .bind(&view.resource_type)
        .bind(JsonValue::Object(view.filters.clone()))
        .bind(JsonValue::Object(view.columns.clone()))
        .fetch_one(executor)
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
        sqlx::query_as::<_, SavedView>(
            r#"
            SELECT id, workspace_id, created_by, name, resource_type, filters, columns, created_at
            FROM saved_views
            WHERE id = $1 AND workspace_id = $2
            "#,
        )
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Views of the workspace, oldest first, optionally for one resource type
    pub async fn list<'e, E>(
        executor: E,
        scope: &TenantScope,
        resource_type: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SavedView>(
            r#"
            SELECT id, workspace_id, created_by, name, resource_type, filters, columns, created_at
            FROM saved_views
            WHERE workspace_id = $1
              AND ($2::text IS NULL OR resource_type = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(scope.workspace_id())
        .bind(resource_type)
        .fetch_all(executor)
        .await
    }

    /// Deletes a view and returns it, or `None` when it is not in scope
    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SavedView>(
            r#"
            DELETE FROM saved_views
            WHERE id = $1 AND workspace_id = $2
            RETURNING id, workspace_id, created_by, name, resource_type, filters, columns, created_at
            "#,
        )
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }
}
