/// Teams: named groups of workspace members
///
/// A team share grants its role to every member of the team. Only accepted members
/// can join a team, and removing someone from the workspace removes them from its
/// teams as well (see [`super::members::remove_member`]).

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::access::{authorize, Actor};
use super::{EngineError, EngineResult};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::membership::Role;
use crate::models::team::{Team, TeamMember, TeamSummary};

pub async fn create_team(pool: &PgPool, actor: &Actor, workspace_id: Uuid, name: &str) -> EngineResult<Team> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::Validation("Team name must not be empty".to_string()));
    }

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    let team = Team::create(&mut *tx, &access.scope, name, actor.user_id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::TeamCreate, EntityType::Team, Some(team.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": team.name })),
    )
    .await?;

    tx.commit().await?;
    Ok(team)
}

pub async fn list_teams(pool: &PgPool, actor: &Actor, workspace_id: Uuid) -> EngineResult<Vec<TeamSummary>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    Ok(Team::list(pool, &access.scope).await?)
}

pub async fn list_team_members(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    team_id: Uuid,
) -> EngineResult<Vec<TeamMember>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;

    if Team::find(pool, &access.scope, team_id).await?.is_none() {
        return Err(EngineError::not_found("Team"));
    }

    Ok(TeamMember::list_for_team(pool, &access.scope, team_id).await?)
}

/// Adds an accepted member of the workspace to a team
pub async fn add_team_member(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    team_id: Uuid,
    user_id: Uuid,
) -> EngineResult<TeamMember> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    if Team::find(&mut *tx, &access.scope, team_id).await?.is_none() {
        return Err(EngineError::not_found("Team"));
    }

    let member = TeamMember::add(&mut *tx, &access.scope, team_id, user_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Member"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::TeamMemberAdd, EntityType::Team, Some(team_id))
            .actor(Some(actor.user_id))
            .diff(json!({ "user_id": user_id })),
    )
    .await?;

    tx.commit().await?;
    Ok(member)
}

pub async fn remove_team_member(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    team_id: Uuid,
    user_id: Uuid,
) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    if !TeamMember::remove(&mut *tx, &access.scope, team_id, user_id).await? {
        return Err(EngineError::not_found("Team member"));
    }

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::TeamMemberRemove, EntityType::Team, Some(team_id))
            .actor(Some(actor.user_id))
            .diff(json!({ "user_id": user_id })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}
