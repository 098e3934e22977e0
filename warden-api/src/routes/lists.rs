/// List and column endpoints
///
/// # Endpoints
///
/// - `GET    /v1/workspaces/:id/lists` - Live lists
/// - `POST   /v1/workspaces/:id/lists` - Create (editor+)
/// - `GET    /v1/workspaces/:id/lists/:list_id` - Members, or a share on the list
/// - `PATCH  /v1/workspaces/:id/lists/:list_id` - Editor+ or an editor share
/// - `DELETE /v1/workspaces/:id/lists/:list_id` - Archive (editor+)
/// - `GET    /v1/workspaces/:id/lists/:list_id/columns`
/// - `POST   /v1/workspaces/:id/lists/:list_id/columns`
/// - `DELETE /v1/workspaces/:id/lists/:list_id/columns/:column_id`

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, resources};
use warden_shared::models::list::{Column, List, ListPatch, NewColumn, NewList};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateColumnRequest {
    /// Key under which items store the value
    #[validate(length(min = 1, max = 100, message = "Key must be 1 to 100 characters"))]
    pub key: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Column type must be 1 to 50 characters"))]
    pub column_type: String,

    #[serde(default)]
    pub position: i32,

    #[serde(default)]
    pub is_required: bool,

    #[serde(default)]
    pub config: Option<JsonValue>,
}

pub async fn list_lists(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Vec<List>>> {
    Ok(Json(resources::list_lists(&state.db, &actor, workspace_id).await?))
}

pub async fn create_list(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateListRequest>,
) -> ApiResult<(StatusCode, Json<List>)> {
    req.validate()?;

    let list = resources::create_list(
        &state.db,
        &actor,
        workspace_id,
        NewList {
            name: req.name,
            description: req.description,
            position: req.position,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(list)))
}

pub async fn get_list(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<List>> {
    Ok(Json(resources::get_list(&state.db, &actor, workspace_id, list_id).await?))
}

/// Partial update; `{"description": null}` clears the description
pub async fn update_list(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<ListPatch>,
) -> ApiResult<Json<List>> {
    Ok(Json(
        resources::update_list(&state.db, &actor, workspace_id, list_id, patch).await?,
    ))
}

/// Soft delete; the list's shares are removed with it
pub async fn archive_list(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    resources::archive_list(&state.db, &actor, workspace_id, list_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_columns(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Column>>> {
    Ok(Json(
        resources::list_columns(&state.db, &actor, workspace_id, list_id).await?,
    ))
}

/// # Errors
///
/// - `409 Conflict`: The list already has a column with this key
pub async fn create_column(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateColumnRequest>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    req.validate()?;

    let column = resources::create_column(
        &state.db,
        &actor,
        workspace_id,
        list_id,
        NewColumn {
            key: req.key,
            name: req.name,
            column_type: req.column_type,
            position: req.position,
            is_required: req.is_required,
            config: req.config.unwrap_or_else(|| JsonValue::Object(Default::default())),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(column)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id, column_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    resources::delete_column(&state.db, &actor, workspace_id, list_id, column_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
