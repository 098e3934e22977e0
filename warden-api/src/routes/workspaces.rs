/// Workspace endpoints
///
/// - `GET    /v1/workspaces` - Workspaces the caller has accepted membership in
/// - `POST   /v1/workspaces` - Create a workspace; the caller becomes its owner
/// - `GET    /v1/workspaces/:id` - Any member
/// - `PATCH  /v1/workspaces/:id` - Owner or admin; `settings` merges key by key
/// - `DELETE /v1/workspaces/:id` - Owner; cascades every tenant row

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, workspaces};
use warden_shared::models::workspace::{Workspace, WorkspacePatch, WorkspaceSummary};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[serde(default)]
    pub settings: Option<Map<String, JsonValue>>,
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<WorkspaceSummary>>> {
    Ok(Json(workspaces::list(&state.db, &actor).await?))
}

/// # Errors
///
/// - `400 Bad Request`: Missing or overlong name
pub async fn create_workspace(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<(StatusCode, Json<Workspace>)> {
    req.validate()?;

    let workspace = workspaces::create(&state.db, &actor, &req.name, req.settings).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Workspace>> {
    Ok(Json(workspaces::get(&state.db, &actor, workspace_id).await?))
}

/// Partial update
///
/// ```text
/// PATCH /v1/workspaces/:id
///
/// { "name": "Renamed", "settings": { "theme": "dark", "legacy_flag": null } }
/// ```
pub async fn update_workspace(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(patch): Json<WorkspacePatch>,
) -> ApiResult<Json<Workspace>> {
    Ok(Json(workspaces::update(&state.db, &actor, workspace_id, patch).await?))
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    workspaces::delete(&state.db, &actor, workspace_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
