/// Lists and their column schema
///
/// A list is a named collection of items inside a workspace; its columns describe
/// the keys items are expected to carry in their `values` object. Archiving a list
/// stamps `archived_at` and hides it from listings. Columns are hard-deleted.
///
/// Every function here takes a [`TenantScope`] and filters on its workspace id.
/// Columns are inserted with `INSERT ... SELECT` from the parent list row of the same
/// workspace, so a list id from another tenant inserts nothing and yields `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::patch::Field;
use super::scope::TenantScope;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct List {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_by: Option<Uuid>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewList {
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
}

/// Partial update of a list; `description: null` clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPatch {
    #[serde(default)]
    pub name: Field<String>,

    #[serde(default)]
    pub description: Field<Option<String>>,

    #[serde(default)]
    pub position: Field<i32>,
}

impl ListPatch {
    pub fn apply(self, list: &mut List) -> Map<String, JsonValue> {
        let mut diff = Map::new();

        if let Some(change) = self.name.apply_to(&mut list.name) {
            diff.insert("name".to_string(), change);
        }
        if let Some(change) = self.description.apply_to(&mut list.description) {
            diff.insert("description".to_string(), change);
        }
        if let Some(change) = self.position.apply_to(&mut list.position) {
            diff.insert("position".to_string(), change);
        }

        diff
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Column {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub list_id: Uuid,

    /// Key under which items store this column's value; unique per list
    pub key: String,

    pub name: String,
    pub column_type: String,
    pub position: i32,
    pub is_required: bool,
    pub config: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewColumn {
    pub key: String,
    pub name: String,
    pub column_type: String,
    pub position: i32,
    pub is_required: bool,
    pub config: JsonValue,
}

const LIST_COLUMNS: &str =
    "id, workspace_id, name, description, position, created_by, archived_at, created_at, updated_at";

const COLUMN_COLUMNS: &str = "id, workspace_id, list_id, key, name, column_type, position, \
                              is_required, config, created_at, updated_at";

impl List {
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        data: NewList,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, List>(&format!(
            r#"
            INSERT INTO lists (workspace_id, name, description, position, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(scope.workspace_id())
        .bind(data.name)
        .bind(data.description)
        .bind(data.position)
        .bind(created_by)
        .fetch_one(executor)
        .await
    }

    /// Finds a live (not archived) list of the workspace
    pub async fn find<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, List>(&format!(
            r#"
            SELECT {LIST_COLUMNS}
            FROM lists
            WHERE id = $1 AND workspace_id = $2 AND archived_at IS NULL
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    pub async fn find_for_update(
        conn: &mut PgConnection,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, List>(&format!(
            r#"
            SELECT {LIST_COLUMNS}
            FROM lists
            WHERE id = $1 AND workspace_id = $2 AND archived_at IS NULL
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(conn)
        .await
    }

    /// Live lists of the workspace in display order
    pub async fn list<'e, E>(executor: E, scope: &TenantScope) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, List>(&format!(
            r#"
            SELECT {LIST_COLUMNS}
            FROM lists
            WHERE workspace_id = $1 AND archived_at IS NULL
            ORDER BY position, created_at
            "#
        ))
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }

    pub async fn save<'e, E>(&self, executor: E, scope: &TenantScope) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, List>(&format!(
            r#"
            UPDATE lists
            SET name = $3, description = $4, position = $5, updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(scope.workspace_id())
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.position)
        .fetch_one(executor)
        .await
    }

    /// Soft-deletes a live list; `None` when it is missing or already archived
    pub async fn archive<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, List>(&format!(
            r#"
            UPDATE lists
            SET archived_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2 AND archived_at IS NULL
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }
}

impl Column {
    /// Adds a column to a live list of the workspace
    ///
    /// Returns `None` when the list is not in scope.
    ///
    /// # Errors
    ///
    /// A duplicate key trips `uq_list_column_key`.
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Uuid,
        data: NewColumn,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Column>(&format!(
            r#"
            INSERT INTO list_columns (workspace_id, list_id, key, name, column_type, position, is_required, config)
            SELECT l.workspace_id, l.id, $3, $4, $5, $6, $7, $8
            FROM lists l
            WHERE l.id = $1 AND l.workspace_id = $2 AND l.archived_at IS NULL
            RETURNING {COLUMN_COLUMNS}
            "#
        ))
        .bind(list_id)
        .bind(scope.workspace_id())
        .bind(data.key)
        .bind(data.name)
        .bind(data.column_type)
        .bind(data.position)
        .bind(data.is_required)
        .bind(data.config)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_for_list<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Column>(&format!(
            r#"
            SELECT {COLUMN_COLUMNS}
            FROM list_columns
            WHERE list_id = $1 AND workspace_id = $2
            ORDER BY position, created_at
            "#
        ))
        .bind(list_id)
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Uuid,
        column_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Column>(&format!(
            r#"
            DELETE FROM list_columns
            WHERE id = $1 AND list_id = $2 AND workspace_id = $3
            RETURNING {COLUMN_COLUMNS}
            "#
        ))
        .bind(column_id)
        .bind(list_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list() -> List {
        List {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            name: "Leads".to_string(),
            description: Some("Inbound".to_string()),
            position: 0,
            created_by: None,
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_clears_description_and_keeps_name() {
        let mut l = list();
        let patch: ListPatch =
            serde_json::from_value(json!({"description": null, "position": 2})).unwrap();

        let diff = patch.apply(&mut l);

        assert_eq!(l.name, "Leads");
        assert_eq!(l.description, None);
        assert_eq!(l.position, 2);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff["description"], json!({"old": "Inbound", "new": null}));
    }

    #[test]
    fn test_patch_with_same_values_is_empty() {
        let mut l = list();
        let patch: ListPatch = serde_json::from_value(json!({"name": "Leads"})).unwrap();
        assert!(patch.apply(&mut l).is_empty());
    }
}
