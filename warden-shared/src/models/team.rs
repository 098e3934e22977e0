/// Teams: named groups of workspace members
///
/// Teams exist so a share can be granted to a group at once. A user can only be
/// added while they hold an accepted membership in the team's workspace; removing
/// the membership also removes their team rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::scope::TenantScope;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A team with its member count, for listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// # Errors
    ///
    /// A duplicate name within the workspace trips `uq_teams_workspace_name`.
    pub async fn create<'e, E>(
        executor: E,
        scope: &TenantScope,
        name: &str,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (workspace_id, name, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, workspace_id, name, created_by, created_at
            "#,
        )
        .bind(scope.workspace_id())
        .bind(name)
        .bind(created_by)
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
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, workspace_id, name, created_by, created_at
            FROM teams
            WHERE id = $1 AND workspace_id = $2
            "#,
        )
        .bind(id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E>(
        executor: E,
        scope: &TenantScope,
    ) -> Result<Vec<TeamSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamSummary>(
            r#"
            SELECT t.id, t.name, COUNT(tm.user_id) AS member_count, t.created_at
            FROM teams t
            LEFT JOIN team_members tm ON tm.team_id = t.id
            WHERE t.workspace_id = $1
            GROUP BY t.id
            ORDER BY t.name
            "#,
        )
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }
}

impl TeamMember {
    /// Adds an accepted member of the workspace to one of its teams
    ///
    /// Returns `None` when the team is not in scope or the user is not an accepted
    /// member.
    ///
    /// # Errors
    ///
    /// Adding the same user twice trips `team_members_pkey`.
    pub async fn add<'e, E>(
        executor: E,
        scope: &TenantScope,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, workspace_id)
            SELECT t.id, m.user_id, t.workspace_id
            FROM teams t
            JOIN workspace_memberships m
              ON m.workspace_id = t.workspace_id AND m.user_id = $2 AND m.status = 'accepted'
            WHERE t.id = $1 AND t.workspace_id = $3
            RETURNING team_id, user_id, workspace_id, created_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(scope.workspace_id())
        .fetch_optional(executor)
        .await
    }

    pub async fn remove<'e, E>(
        executor: E,
        scope: &TenantScope,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM team_members WHERE team_id = $1 AND user_id = $2 AND workspace_id = $3",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(scope.workspace_id())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops every team row of a user in the workspace
    pub async fn remove_user_from_all<'e, E>(
        executor: E,
        scope: &TenantScope,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM team_members WHERE user_id = $1 AND workspace_id = $2")
            .bind(user_id)
            .bind(scope.workspace_id())
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_for_team<'e, E>(
        executor: E,
        scope: &TenantScope,
        team_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, workspace_id, created_at
            FROM team_members
            WHERE team_id = $1 AND workspace_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(team_id)
        .bind(scope.workspace_id())
        .fetch_all(executor)
        .await
    }
}
