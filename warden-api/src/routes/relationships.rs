/// Relationship endpoints
///
/// A relationship connects two lists of the same workspace; its links connect
/// individual items. `one_to_many` allows each target item a single source.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, relationships};
use warden_shared::models::relationship::{NewRelationship, Relationship, RelationshipLink, RelationshipType};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRelationshipRequest {
    pub list_id: Uuid,
    pub target_list_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,

    pub relationship_type: RelationshipType,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub source_item_id: Uuid,
    pub target_item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipFilter {
    /// Relationships whose source is this list
    pub list_id: Option<Uuid>,
}

pub async fn list_relationships(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Query(filter): Query<RelationshipFilter>,
) -> ApiResult<Json<Vec<Relationship>>> {
    Ok(Json(
        relationships::list_relationships(&state.db, &actor, workspace_id, filter.list_id).await?,
    ))
}

pub async fn create_relationship(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateRelationshipRequest>,
) -> ApiResult<(StatusCode, Json<Relationship>)> {
    req.validate()?;

    let relationship = relationships::create_relationship(
        &state.db,
        &actor,
        workspace_id,
        NewRelationship {
            list_id: req.list_id,
            target_list_id: req.target_list_id,
            name: req.name,
            relationship_type: req.relationship_type,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(relationship)))
}

pub async fn delete_relationship(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, relationship_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    relationships::delete_relationship(&state.db, &actor, workspace_id, relationship_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_links(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, relationship_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<RelationshipLink>>> {
    Ok(Json(
        relationships::list_links(&state.db, &actor, workspace_id, relationship_id).await?,
    ))
}

/// # Errors
///
/// - `409 Conflict`: Duplicate link, or a second source for a `one_to_many` target
pub async fn create_link(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, relationship_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<RelationshipLink>)> {
    let link = relationships::create_link(
        &state.db,
        &actor,
        workspace_id,
        relationship_id,
        req.source_item_id,
        req.target_item_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn delete_link(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, link_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    relationships::delete_link(&state.db, &actor, workspace_id, link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
