/// Workspace lifecycle
///
/// | Operation | Roles |
/// |---|---|
/// | create | any authenticated user |
/// | list | caller's accepted memberships |
/// | get | any role |
/// | update | owner, admin |
/// | delete | owner |
///
/// Creation inserts the workspace, the creator's owner membership and the audit row
/// in one transaction. Deletion cascades every tenant row, the audit log included,
/// so it is recorded in the service log only.

use serde_json::{json, Map, Value as JsonValue};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::access::{authorize, Actor};
use super::{EngineError, EngineResult};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::membership::{Membership, Role};
use crate::models::scope::TenantScope;
use crate::models::workspace::{Workspace, WorkspacePatch, WorkspaceSummary};

pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    name: &str,
    settings: Option<Map<String, JsonValue>>,
) -> EngineResult<Workspace> {
    let settings = JsonValue::Object(settings.unwrap_or_default());

    let mut tx = pool.begin().await?;
    let workspace = create_in_tx(&mut tx, actor.user_id, name, settings).await?;
    tx.commit().await?;

    Ok(workspace)
}

/// Creates a workspace with its owner inside an open transaction
pub(crate) async fn create_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    name: &str,
    settings: JsonValue,
) -> EngineResult<Workspace> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::Validation("Workspace name must not be empty".to_string()));
    }

    let workspace = Workspace::create(&mut **tx, name, settings, owner_id).await?;
    let membership = Membership::create_owner(&mut **tx, workspace.id, owner_id).await?;
    let scope = TenantScope::new(workspace.id);

    AuditLog::record(
        tx,
        &scope,
        AuditEntry::new(Action::WorkspaceCreate, EntityType::Workspace, Some(workspace.id))
            .actor(Some(owner_id))
            .diff(json!({ "name": workspace.name, "owner_membership_id": membership.id })),
    )
    .await?;

    info!(workspace_id = %workspace.id, user_id = %owner_id, "Workspace created");
    Ok(workspace)
}

pub async fn list(pool: &PgPool, actor: &Actor) -> EngineResult<Vec<WorkspaceSummary>> {
    Ok(Workspace::list_for_user(pool, actor.user_id).await?)
}

pub async fn get(pool: &PgPool, actor: &Actor, workspace_id: Uuid) -> EngineResult<Workspace> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;

    Workspace::find(pool, access.scope.workspace_id())
        .await?
        .ok_or_else(|| EngineError::not_found("Workspace"))
}

/// Applies a partial update and records the changed fields
///
/// A patch that changes nothing writes nothing, not even an audit row.
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    patch: WorkspacePatch,
) -> EngineResult<Workspace> {
    if let Some(name) = patch.name.as_ref().into_option() {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("Workspace name must not be empty".to_string()));
        }
    }

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    let mut workspace = Workspace::find_for_update(&mut tx, access.scope.workspace_id())
        .await?
        .ok_or_else(|| EngineError::not_found("Workspace"))?;

    let diff = patch.apply(&mut workspace);
    if diff.is_empty() {
        tx.rollback().await?;
        return Ok(workspace);
    }

    let workspace = workspace.save(&mut *tx).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::WorkspaceUpdate, EntityType::Workspace, Some(workspace.id))
            .actor(Some(actor.user_id))
            .diff(JsonValue::Object(diff)),
    )
    .await?;

    tx.commit().await?;
    Ok(workspace)
}

pub async fn delete(pool: &PgPool, actor: &Actor, workspace_id: Uuid) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::OWNERS).await?;

    if !Workspace::delete(&mut *tx, access.scope.workspace_id()).await? {
        return Err(EngineError::not_found("Workspace"));
    }

    tx.commit().await?;

    info!(workspace_id = %workspace_id, user_id = %actor.user_id, "Workspace deleted");
    Ok(())
}
