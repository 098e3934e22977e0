/// Workspaces: the tenant boundary
///
/// Every resource, membership, share and audit row references exactly one workspace
/// and is removed with it (`ON DELETE CASCADE`). A workspace never exists without an
/// accepted owner: it is only created through
/// [`engine::workspaces::create`](crate::engine::workspaces::create), which inserts
/// it together with the creator's owner membership in one transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE workspaces (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     settings JSONB NOT NULL DEFAULT '{}',
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::membership::Role;
use super::patch::{merge_object, Field};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,

    /// Opaque key-value settings
    pub settings: JsonValue,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkspaceSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a workspace
///
/// `settings` merges key-by-key into the stored object; a `null` value removes the
/// key. Keys not mentioned are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspacePatch {
    #[serde(default)]
    pub name: Field<String>,

    #[serde(default)]
    pub settings: Field<Map<String, JsonValue>>,
}

impl WorkspacePatch {
    /// Applies the patch in place and returns the audit diff of what changed
    pub fn apply(self, workspace: &mut Workspace) -> Map<String, JsonValue> {
        let mut diff = Map::new();

        if let Some(change) = self.name.apply_to(&mut workspace.name) {
            diff.insert("name".to_string(), change);
        }

        if let Field::Present(settings) = self.settings {
            let changes = merge_object(&mut workspace.settings, settings);
            if !changes.is_empty() {
                diff.insert("settings".to_string(), JsonValue::Object(changes));
            }
        }

        diff
    }
}

impl Workspace {
    pub async fn create<'e, E>(
        executor: E,
        name: &str,
        settings: JsonValue,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Workspace>(
            r#"
            INSERT INTO workspaces (name, settings, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, settings, created_by, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(settings)
        .bind(created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, name, settings, created_by, created_at, updated_at
            FROM workspaces
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, name, settings, created_by, created_at, updated_at
            FROM workspaces
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Writes name and settings back and bumps `updated_at`
    pub async fn save<'e, E>(&self, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Workspace>(
            r#"
            UPDATE workspaces
            SET name = $2, settings = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, settings, created_by, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.settings)
        .fetch_one(executor)
        .await
    }

    /// Deletes a workspace and, through cascades, everything it owns
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Workspaces in which the user holds an accepted membership
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, WorkspaceSummary>(
            r#"
            SELECT w.id, w.name, m.role, w.created_at
            FROM workspaces w
            JOIN workspace_memberships m ON m.workspace_id = w.id
            WHERE m.user_id = $1 AND m.status = 'accepted'
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workspace() -> Workspace {
        Workspace {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            settings: json!({"theme": "dark", "locale": "en"}),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut ws = workspace();
        let diff = WorkspacePatch::default().apply(&mut ws);

        assert!(diff.is_empty());
        assert_eq!(ws.name, "Acme");
        assert_eq!(ws.settings, json!({"theme": "dark", "locale": "en"}));
    }

    #[test]
    fn test_patch_merges_settings_and_renames() {
        let mut ws = workspace();
        let patch: WorkspacePatch = serde_json::from_value(json!({
            "name": "Acme EU",
            "settings": {"locale": "de", "theme": null, "beta": true}
        }))
        .unwrap();

        let diff = patch.apply(&mut ws);

        assert_eq!(ws.name, "Acme EU");
        assert_eq!(ws.settings, json!({"locale": "de", "beta": true}));
        assert_eq!(diff["name"], json!({"old": "Acme", "new": "Acme EU"}));
        assert_eq!(diff["settings"]["theme"], json!({"old": "dark", "new": null}));
        assert_eq!(diff["settings"].as_object().unwrap().len(), 3);
    }
}
