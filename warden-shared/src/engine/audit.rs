/// Audit log reads
///
/// Rows are written by the operations themselves through
/// [`AuditLog::record`](crate::models::audit_log::AuditLog::record); this module only
/// pages through them.

use sqlx::PgPool;
use uuid::Uuid;

use super::access::{authorize, Actor};
use super::EngineResult;
use crate::models::audit_log::{AuditLog, DEFAULT_PAGE_SIZE};
use crate::models::membership::Role;

/// Newest-first page of the workspace's audit log; readable by any role
pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
) -> EngineResult<Vec<AuditLog>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;

    Ok(AuditLog::list(
        pool,
        &access.scope,
        limit.unwrap_or(DEFAULT_PAGE_SIZE),
        offset.unwrap_or(0),
    )
    .await?)
}
