/// Audit log endpoint
///
/// ```text
/// GET /v1/workspaces/:id/audit?limit=100&offset=0
/// ```
///
/// Newest first. Readable by any member.

use super::Pagination;
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;
use warden_shared::engine::{access::Actor, audit};
use warden_shared::models::audit_log::AuditLog;

pub async fn list_audit(
    State(state): State<AppState>,
    actor: Actor,
    Path(workspace_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    page.validate()?;

    Ok(Json(
        audit::list(&state.db, &actor, workspace_id, page.limit, page.offset).await?,
    ))
}
