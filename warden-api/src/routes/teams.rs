/// Team endpoints

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, teams};
use warden_shared::models::team::{Team, TeamMember, TeamSummary};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTeamMemberRequest {
    pub user_id: Uuid,
}

pub async fn list_teams(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TeamSummary>>> {
    Ok(Json(teams::list_teams(&state.db, &actor, workspace_id).await?))
}

pub async fn create_team(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    req.validate()?;

    let team = teams::create_team(&state.db, &actor, workspace_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn list_team_members(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, team_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<TeamMember>>> {
    Ok(Json(
        teams::list_team_members(&state.db, &actor, workspace_id, team_id).await?,
    ))
}

/// The user must be an accepted member of the workspace (`404` otherwise)
pub async fn add_team_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, team_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AddTeamMemberRequest>,
) -> ApiResult<(StatusCode, Json<TeamMember>)> {
    let member = teams::add_team_member(&state.db, &actor, workspace_id, team_id, req.user_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_team_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, team_id, user_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    teams::remove_team_member(&state.db, &actor, workspace_id, team_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
