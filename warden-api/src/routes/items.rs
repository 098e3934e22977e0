/// Item and comment endpoints
///
/// # Endpoints
///
/// - `GET    /v1/workspaces/:id/lists/:list_id/items?limit&offset`
/// - `POST   /v1/workspaces/:id/lists/:list_id/items`
/// - `GET    /v1/workspaces/:id/items/:item_id`
/// - `PATCH  /v1/workspaces/:id/items/:item_id` - `values` merges key by key
/// - `DELETE /v1/workspaces/:id/items/:item_id` - Archive
/// - `GET    /v1/workspaces/:id/items/:item_id/comments`
/// - `POST   /v1/workspaces/:id/items/:item_id/comments` - Members, or a commenter share
/// - `DELETE /v1/workspaces/:id/comments/:comment_id` - Author, owner or admin

use super::Pagination;
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, resources};
use warden_shared::models::item::{Comment, Item, ItemPatch, NewItem};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(max = 500, message = "Title must be at most 500 characters"))]
    pub title: Option<String>,

    /// Column key to value
    #[serde(default)]
    pub values: Map<String, JsonValue>,

    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Content must be 1 to 10000 characters"))]
    pub content: String,
}

pub async fn list_items(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Item>>> {
    page.validate()?;

    let items = resources::list_items(&state.db, &actor, workspace_id, list_id, page.limit, page.offset).await?;
    Ok(Json(items))
}

pub async fn create_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, list_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    req.validate()?;

    let item = resources::create_item(
        &state.db,
        &actor,
        workspace_id,
        list_id,
        NewItem {
            title: req.title,
            values: req.values,
            position: req.position,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Item>> {
    Ok(Json(resources::get_item(&state.db, &actor, workspace_id, item_id).await?))
}

/// Partial update
///
/// ```text
/// PATCH /v1/workspaces/:id/items/:item_id
///
/// { "values": { "status": "done", "estimate": null } }
/// ```
///
/// `estimate` is removed, `status` is set, other keys are left alone.
pub async fn update_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, item_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<ItemPatch>,
) -> ApiResult<Json<Item>> {
    Ok(Json(
        resources::update_item(&state.db, &actor, workspace_id, item_id, patch).await?,
    ))
}

pub async fn archive_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    resources::archive_item(&state.db, &actor, workspace_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(
        resources::list_comments(&state.db, &actor, workspace_id, item_id).await?,
    ))
}

pub async fn create_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    req.validate()?;

    let comment = resources::create_comment(&state.db, &actor, workspace_id, item_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    resources::delete_comment(&state.db, &actor, workspace_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
