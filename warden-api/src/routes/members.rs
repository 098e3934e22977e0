/// Membership and invite endpoints
///
/// # Endpoints
///
/// - `GET    /v1/workspaces/:id/members` - Accepted members and pending invites
/// - `POST   /v1/workspaces/:id/members` - Invite an e-mail address
/// - `PATCH  /v1/workspaces/:id/members/:membership_id` - Change a role
/// - `DELETE /v1/workspaces/:id/members/:membership_id` - Remove a member (or leave)
/// - `POST   /v1/workspaces/:id/invites/:membership_id/revoke` - Revoke a pending invite
/// - `POST   /v1/invites/accept` - Accept an invite with its token

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{
    access::Actor,
    members::{self, InviteIssued},
};
use warden_shared::models::membership::{MemberSummary, Membership, Role};

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

pub async fn list_members(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberSummary>>> {
    Ok(Json(members::list_members(&state.db, &actor, workspace_id).await?))
}

/// Invite an e-mail address
///
/// ```text
/// POST /v1/workspaces/:id/members
///
/// { "email": "grace@example.com", "role": "editor" }
/// ```
///
/// The response carries the plaintext token once; the invite e-mail is sent after
/// the invite is stored, and a delivery failure does not undo it.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not owner/admin, or invites an owner without being one
/// - `409 Conflict`: Already a member, or already invited
pub async fn invite_member(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteIssued>)> {
    req.validate()?;

    let issued = members::invite(
        &state.db,
        state.mailer.clone(),
        &state.invites,
        &actor,
        workspace_id,
        &req.email,
        req.role,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// # Errors
///
/// - `404 Not Found`: Unknown, used, revoked or expired token
/// - `409 Conflict`: Caller is already a member of the workspace
pub async fn accept_invite(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<AcceptInviteRequest>,
) -> ApiResult<Json<Membership>> {
    req.validate()?;
    Ok(Json(members::accept(&state.db, &actor, &req.token).await?))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Membership>> {
    Ok(Json(
        members::revoke_invite(&state.db, &actor, workspace_id, membership_id).await?,
    ))
}

/// # Errors
///
/// - `409 Conflict`: Demoting the last owner
pub async fn update_role(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, membership_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Membership>> {
    Ok(Json(
        members::update_role(&state.db, &actor, workspace_id, membership_id, req.role).await?,
    ))
}

/// # Errors
///
/// - `409 Conflict`: Removing the last owner, including the last owner leaving
pub async fn remove_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((workspace_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    members::remove_member(&state.db, &actor, workspace_id, membership_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_request_parses_role() {
        let req: InviteRequest =
            serde_json::from_str(r#"{"email":"grace@example.com","role":"editor"}"#).unwrap();
        assert_eq!(req.role, Role::Editor);
        assert!(req.validate().is_ok());

        assert!(serde_json::from_str::<InviteRequest>(r#"{"email":"a@b.c","role":"superuser"}"#).is_err());

        let bad: InviteRequest = serde_json::from_str(r#"{"email":"nope","role":"member"}"#).unwrap();
        assert!(bad.validate().is_err());
    }
}
