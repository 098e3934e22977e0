/// Share endpoints
///
/// # Endpoints
///
/// - `GET    /v1/workspaces/:id/shares?resource_type&resource_id` - User and team shares
/// - `POST   /v1/workspaces/:id/shares` - Grant a role to a user (by e-mail) or a team
/// - `DELETE /v1/workspaces/:id/shares/:share_id` - Owner or admin
/// - `POST   /v1/workspaces/:id/links` - Mint an anonymous link share
/// - `GET    /s/:token` - Resolve a link share (public)
///
/// Link tokens appear in the response of `POST /links` exactly once. Every
/// successful resolution counts one view; an expired or exhausted link answers 410.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{
    access::{Actor, ResourceRef},
    sharing::{self, LinkIssued, LinkRequest, ResolvedLink, ShareRequest, ShareTarget},
};
use warden_shared::models::share::{ResourceShare, ResourceType, ShareRole};

/// Grant request; exactly one of `email` and `team_id`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateShareRequest {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub team_id: Option<Uuid>,

    pub role: ShareRole,

    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateShareRequest {
    fn target(&self) -> Result<ShareTarget, ApiError> {
        match (&self.email, self.team_id) {
            (Some(email), None) => Ok(ShareTarget::Email(email.clone())),
            (None, Some(team_id)) => Ok(ShareTarget::Team(team_id)),
            _ => Err(ApiError::invalid_field(
                "email",
                "Provide exactly one of email or team_id",
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,

    /// Defaults to `viewer`
    pub role: Option<ShareRole>,

    /// Omitted: the configured default; `0`: never expires
    #[validate(range(max = 3650, message = "expires_in_days must be at most 3650"))]
    pub expires_in_days: Option<u32>,

    #[validate(range(min = 1, message = "max_views must be at least 1"))]
    pub max_views: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ShareFilter {
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<Uuid>,
}

impl ShareFilter {
    fn resource(&self) -> Result<Option<ResourceRef>, ApiError> {
        match (self.resource_type, self.resource_id) {
            (Some(resource_type), Some(resource_id)) => Ok(Some(ResourceRef {
                resource_type,
                resource_id,
            })),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest(
                "resource_type and resource_id must be given together".to_string(),
            )),
        }
    }
}

pub async fn list_shares(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Query(filter): Query<ShareFilter>,
) -> ApiResult<Json<Vec<ResourceShare>>> {
    let resource = filter.resource()?;
    Ok(Json(
        sharing::list_shares(&state.db, &actor, workspace_id, resource).await?,
    ))
}

/// # Errors
///
/// - `404 Not Found`: Unknown resource, e-mail or team
/// - `409 Conflict`: The grantee already holds a share on the resource
pub async fn create_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateShareRequest>,
) -> ApiResult<(StatusCode, Json<ResourceShare>)> {
    req.validate()?;
    let target = req.target()?;

    let share = sharing::create_share(
        &state.db,
        &actor,
        workspace_id,
        ShareRequest {
            resource: ResourceRef {
                resource_type: req.resource_type,
                resource_id: req.resource_id,
            },
            target,
            role: req.role,
            expires_at: req.expires_at,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(share)))
}

pub async fn delete_share(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, share_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    sharing::delete_share(&state.db, &actor, workspace_id, share_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mint a link share
///
/// ```text
/// POST /v1/workspaces/:id/links
///
/// { "resource_type": "list", "resource_id": "uuid", "max_views": 2 }
/// ```
///
/// # Response (201)
///
/// ```json
/// { "id": "uuid", "token": "shr_...", "url": "/s/shr_...", "role": "viewer",
///   "expires_at": "...", "max_views": 2 }
/// ```
pub async fn create_link(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<LinkIssued>)> {
    req.validate()?;

    let issued = sharing::create_link(
        &state.db,
        &state.links,
        &actor,
        workspace_id,
        LinkRequest {
            resource: ResourceRef {
                resource_type: req.resource_type,
                resource_id: req.resource_id,
            },
            role: req.role.unwrap_or(ShareRole::Viewer),
            expires_in_days: req.expires_in_days,
            max_views: req.max_views,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// Resolve a link share without credentials
///
/// # Errors
///
/// - `404 Not Found`: Unknown or malformed token
/// - `410 Gone`: Expired, or its view quota is used up
/// - `429 Too Many Requests`: Rate limited (when Redis is configured)
pub async fn resolve_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ResolvedLink>> {
    Ok(Json(sharing::resolve_link(&state.db, &token).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share_request(body: &str) -> CreateShareRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_share_target_requires_exactly_one_grantee() {
        let id = Uuid::new_v4();

        let by_email = share_request(&format!(
            r#"{{"resource_type":"list","resource_id":"{id}","email":"grace@example.com","role":"viewer"}}"#
        ));
        assert_eq!(
            by_email.target().unwrap(),
            ShareTarget::Email("grace@example.com".to_string())
        );

        let by_team = share_request(&format!(
            r#"{{"resource_type":"item","resource_id":"{id}","team_id":"{id}","role":"editor"}}"#
        ));
        assert_eq!(by_team.target().unwrap(), ShareTarget::Team(id));

        let neither = share_request(&format!(
            r#"{{"resource_type":"item","resource_id":"{id}","role":"editor"}}"#
        ));
        assert!(neither.target().is_err());

        let both = share_request(&format!(
            r#"{{"resource_type":"item","resource_id":"{id}","email":"a@b.io","team_id":"{id}","role":"viewer"}}"#
        ));
        assert!(both.target().is_err());
    }

    #[test]
    fn test_link_request_rejects_zero_views() {
        let id = Uuid::new_v4();
        let req: CreateLinkRequest = serde_json::from_str(&format!(
            r#"{{"resource_type":"list","resource_id":"{id}","max_views":0}}"#
        ))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateLinkRequest = serde_json::from_str(&format!(
            r#"{{"resource_type":"list","resource_id":"{id}","expires_in_days":0}}"#
        ))
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(req.role.is_none());
    }

    #[test]
    fn test_share_filter_needs_both_parts() {
        let id = Uuid::new_v4();
        let filter = ShareFilter {
            resource_type: Some(ResourceType::List),
            resource_id: Some(id),
        };
        assert_eq!(filter.resource().unwrap(), Some(ResourceRef::list(id)));

        let partial = ShareFilter {
            resource_type: None,
            resource_id: Some(id),
        };
        assert!(partial.resource().is_err());
    }
}
