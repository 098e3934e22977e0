/// Saved view endpoints

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
use warden_shared::engine::{access::Actor, views};
use warden_shared::models::saved_view::{NewSavedView, SavedView};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateViewRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "resource_type must be 1 to 50 characters"))]
    pub resource_type: String,

    #[serde(default)]
    pub filters: Map<String, JsonValue>,

    #[serde(default)]
    pub columns: Map<String, JsonValue>,
}

/// `?resource_type=` on the listing
#[derive(Debug, Default, Deserialize)]
pub struct ViewFilter {
    pub resource_type: Option<String>,
}

pub async fn list_views(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Query(filter): Query<ViewFilter>,
) -> ApiResult<Json<Vec<SavedView>>> {
    let listed = views::list_views(&state.db, &actor, workspace_id, filter.resource_type.as_deref()).await?;
    Ok(Json(listed))
}

pub async fn create_view(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateViewRequest>,
) -> ApiResult<(StatusCode, Json<SavedView>)> {
    req.validate()?;

    let view = views::create_view(
        &state.db,
        &actor,
        workspace_id,
        NewSavedView {
            name: req.name,
            resource_type: req.resource_type,
            filters: req.filters,
            columns: req.columns,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Owners and admins only
pub async fn delete_view(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, view_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    views::delete_view(&state.db, &actor, workspace_id, view_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_view_request_defaults() {
        let req: CreateViewRequest =
            serde_json::from_str(r#"{"name":"Open deals","resource_type":"items"}"#).unwrap();
        assert!(req.filters.is_empty());
        assert!(req.columns.is_empty());
        assert!(req.validate().is_ok());

        let bad: CreateViewRequest = serde_json::from_str(r#"{"name":"","resource_type":"items"}"#).unwrap();
        assert!(bad.validate().is_err());

        // Filters must be an object
        assert!(serde_json::from_str::<CreateViewRequest>(
            r#"{"name":"x","resource_type":"items","filters":[1,2]}"#
        )
        .is_err());
    }
}
