/// Saved views
///
/// Any member can save and list views. Deleting one takes owner or admin, whoever
/// saved it.

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::access::{authorize, Actor};
use super::{EngineError, EngineResult};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::membership::Role;
use crate::models::saved_view::{NewSavedView, SavedView};

pub async fn create_view(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    view: NewSavedView,
) -> EngineResult<SavedView> {
    let view = NewSavedView {
        name: required("View name", &view.name)?,
        resource_type: required("Resource type", &view.resource_type)?,
        ..view
    };

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::ALL).await?;

    let saved = SavedView::create(&mut *tx, &access.scope, &view, actor.user_id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ViewCreate, EntityType::View, Some(saved.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": saved.name, "resource_type": saved.resource_type })),
    )
    .await?;

    tx.commit().await?;
    Ok(saved)
}

pub async fn list_views(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    resource_type: Option<&str>,
) -> EngineResult<Vec<SavedView>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    let resource_type = resource_type.map(str::trim).filter(|t| !t.is_empty());

    Ok(SavedView::list(pool, &access.scope, resource_type).await?)
}

pub async fn delete_view(pool: &PgPool, actor: &Actor, workspace_id: Uuid, view_id: Uuid) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    let view = SavedView::delete(&mut *tx, &access.scope, view_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Saved view"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ViewDelete, EntityType::View, Some(view.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": view.name, "created_by": view.created_by })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

fn required(what: &str, value: &str) -> EngineResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("View name", "  Open deals ").unwrap(), "Open deals");

        let err = required("Resource type", " \t").unwrap_err();
        assert_eq!(err.to_string(), "Resource type must not be empty");
    }
}
