/// Relationships between lists and links between items
///
/// Writes take owner, admin or editor; reads take any role. For a `one_to_many`
/// relationship a target item has at most one source. Link creation locks the
/// relationship row before checking, so two concurrent links to the same target
/// cannot both pass.

use serde_json::json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::access::{authorize, Actor};
use super::{EngineError, EngineResult};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::membership::Role;
use crate::models::relationship::{NewRelationship, Relationship, RelationshipLink, RelationshipType};

pub async fn create_relationship(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    mut data: NewRelationship,
) -> EngineResult<Relationship> {
    data.name = data.name.trim().to_string();
    if data.name.is_empty() {
        return Err(EngineError::Validation("Relationship name must not be empty".to_string()));
    }

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let relationship = Relationship::create(&mut *tx, &access.scope, data)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::RelationshipCreate, EntityType::Relationship, Some(relationship.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "name": relationship.name,
                "list_id": relationship.list_id,
                "target_list_id": relationship.target_list_id,
                "relationship_type": relationship.relationship_type,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(relationship)
}

/// Relationships of the workspace, or only those whose source list is `list_id`
pub async fn list_relationships(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Option<Uuid>,
) -> EngineResult<Vec<Relationship>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    Ok(Relationship::list(pool, &access.scope, list_id).await?)
}

/// Deletes a relationship and, by cascade, its links
pub async fn delete_relationship(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    relationship_id: Uuid,
) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let relationship = Relationship::delete(&mut *tx, &access.scope, relationship_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Relationship"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::RelationshipDelete, EntityType::Relationship, Some(relationship.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": relationship.name })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn create_link(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    relationship_id: Uuid,
    source_item_id: Uuid,
    target_item_id: Uuid,
) -> EngineResult<RelationshipLink> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let relationship = Relationship::find_for_update(&mut tx, &access.scope, relationship_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Relationship"))?;

    if relationship.relationship_type == RelationshipType::OneToMany
        && RelationshipLink::target_is_linked(&mut *tx, &access.scope, relationship.id, target_item_id)
            .await?
    {
        debug!(
            relationship_id = %relationship.id,
            target_item_id = %target_item_id,
            "Target already linked in one_to_many relationship"
        );
        return Err(EngineError::Conflict(
            "Target item already has a source in this relationship".to_string(),
        ));
    }

    let link = RelationshipLink::create(
        &mut *tx,
        &access.scope,
        relationship.id,
        source_item_id,
        target_item_id,
    )
    .await?
    .ok_or_else(|| EngineError::not_found("Item"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::RelationshipLinkCreate, EntityType::RelationshipLink, Some(link.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "relationship_id": relationship.id,
                "source_item_id": source_item_id,
                "target_item_id": target_item_id,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(link)
}

pub async fn list_links(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    relationship_id: Uuid,
) -> EngineResult<Vec<RelationshipLink>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;

    if Relationship::find(pool, &access.scope, relationship_id).await?.is_none() {
        return Err(EngineError::not_found("Relationship"));
    }

    Ok(RelationshipLink::list_for_relationship(pool, &access.scope, relationship_id).await?)
}

pub async fn delete_link(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    link_id: Uuid,
) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let link = RelationshipLink::delete(&mut *tx, &access.scope, link_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Link"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::RelationshipLinkDelete, EntityType::RelationshipLink, Some(link.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "relationship_id": link.relationship_id,
                "source_item_id": link.source_item_id,
                "target_item_id": link.target_item_id,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}
