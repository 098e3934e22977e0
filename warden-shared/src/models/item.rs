/// Items and their comments
///
/// Items are rows of a list. Their column values live in one JSONB object
/// (`items.data`, exposed as `values`), merged key-by-key on update. Archiving an item
/// stamps `archived_at`; archived items are excluded from listings and lookups.
///
/// Items and comments are inserted with `INSERT ... SELECT` from the parent row of
/// the same workspace. A parent id from another tenant inserts nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::patch::{merge_object, Field};
use super::scope::TenantScope;

/// Maximum page size for item listings
pub const MAX_PAGE_SIZE: i64 = 1000;

pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub list_id: Uuid,
    pub title: Option<String>,

    #[sqlx(rename = "data")]
    pub values: JsonValue,

    pub position: i32,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: Option<String>,
    pub values: Map<String, JsonValue>,
    pub position: i32,
}

/// Partial update of an item
///
/// `values` merges into the stored object; `null` removes a key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub title: Field<Option<String>>,

    #[serde(default)]
    pub values: Field<Map<String, JsonValue>>,

    #[serde(default)]
    pub position: Field<i32>,
}

impl ItemPatch {
    pub fn apply(self, item: &mut Item) -> Map<String, JsonValue> {
        let mut diff = Map::new();

        if let Some(change) = self.title.apply_to(&mut item.title) {
            diff.insert("title".to_string(), change);
        }
        if let Field::Present(values) = self.values {
            let changes = merge_object(&mut item.values, values);
            if !changes.is_empty() {
                diff.insert("values".to_string(), JsonValue::Object(changes));
            }
        }
        if let Some(change) = self.position.apply_to(&mut item.position) {
            diff.insert("position".to_string(), change);
        }

        diff
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub item_id: Uuid,
    pub author_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ITEM_COLUMNS: &str = "id, workspace_id, list_id, title, data, position, created_by, \
                            updated_by, archived_at, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, workspace_id, item_id, author_id, content, created_at, updated_at";

impl Item {
    /// Adds an item to a live list of the workspace; `None` when the list is not in scope
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Uuid,
        data: NewItem,
        created_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (workspace_id, list_id, title, data, position, created_by, updated_by)
            SELECT l.workspace_id, l.id, $3, $4, $5, $6, $6
            FROM lists l
            WHERE l.id = $1 AND l.workspace_id = $2 AND l.archived_at IS NULL
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(list_id)
        .bind(scope.workspace_id())
        .bind(data.title)
        .bind(JsonValue::Object(data.values))
        .bind(data.position)
        .bind(created_by)
        .fetch_optional(executor)
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
        sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
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
        sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE id = $1 AND workspace_id = $2 AND archived_at IS NULL
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(conn)
        .await
    }

    /// Live items of a list, paginated
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`, `offset` to `>= 0`.
    pub async fn list_for_list<'e, E>(
        executor: E,
        scope: &TenantScope,
        list_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE list_id = $1 AND workspace_id = $2 AND archived_at IS NULL
            ORDER BY position, created_at
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(list_id)
        .bind(scope.workspace_id())
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .bind(offset.max(0))
        .fetch_all(executor)
        .await
    }

    pub async fn save<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        updated_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET title = $3, data = $4, position = $5, updated_by = $6, updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(scope.workspace_id())
        .bind(&self.title)
        .bind(&self.values)
        .bind(self.position)
        .bind(updated_by)
        .fetch_one(executor)
        .await
    }

    pub async fn archive<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
        archived_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET archived_at = NOW(), updated_by = $3, updated_at = NOW()
            WHERE id = $1 AND workspace_id = $2 AND archived_at IS NULL
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .bind(archived_by)
        .fetch_optional(executor)
        .await
    }
}

impl Comment {
    /// Adds a comment to a live item of the workspace; `None` when the item is not in scope
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        item_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (workspace_id, item_id, author_id, content)
            SELECT i.workspace_id, i.id, $3, $4
            FROM items i
            WHERE i.id = $1 AND i.workspace_id = $2 AND i.archived_at IS NULL
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(scope.workspace_id())
        .bind(author_id)
        .bind(content)
        .fetch_optional(executor)
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
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE id = $1 AND workspace_id = $2
            "#
        ))
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    /// Comments of an item, newest first
    pub async fn list_for_item<'e, E>(
        executor: E,
        scope: &TenantScope,
        item_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE item_id = $1 AND workspace_id = $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(item_id)
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        scope: &TenantScope,
        id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND workspace_id = $2")
            .bind(id)
            .bind(scope.workspace_id())
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> Item {
        Item {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            title: Some("Acme deal".to_string()),
            values: json!({"stage": "lead", "amount": 1200}),
            position: 0,
            created_by: None,
            updated_by: None,
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_values_merge_without_touching_other_keys() {
        let mut it = item();
        let patch: ItemPatch =
            serde_json::from_value(json!({"values": {"stage": "won"}})).unwrap();

        let diff = patch.apply(&mut it);

        assert_eq!(it.values, json!({"stage": "won", "amount": 1200}));
        assert_eq!(it.title.as_deref(), Some("Acme deal"));
        assert_eq!(diff["values"]["stage"], json!({"old": "lead", "new": "won"}));
    }

    #[test]
    fn test_title_can_be_cleared() {
        let mut it = item();
        let patch: ItemPatch = serde_json::from_value(json!({"title": null})).unwrap();

        let diff = patch.apply(&mut it);

        assert_eq!(it.title, None);
        assert!(diff.contains_key("title"));
        assert!(!diff.contains_key("values"));
    }

    #[test]
    fn test_item_serializes_values_not_data() {
        let json = serde_json::to_value(item()).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["values"]["stage"], "lead");
    }
}
