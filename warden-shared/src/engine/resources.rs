/// Lists, columns, items and comments
///
/// | Operation | Members | Shares on the resource |
/// |---|---|---|
/// | list create, archive | owner, admin, editor | |
/// | list get, columns, items | any role | viewer |
/// | list update | owner, admin, editor | editor |
/// | column create, delete | owner, admin, editor | |
/// | item create, archive | owner, admin, editor | |
/// | item get, comments | any role | viewer |
/// | item update | owner, admin, editor | editor |
/// | comment create | any role | commenter |
/// | comment delete | author, owner, admin | author (commenter) |
///
/// Archiving a list or item also deletes every share pointing at it.

use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::access::{authorize, authorize_resource, Actor, Grant, ResourceRef};
use super::{EngineError, EngineResult};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::item::{Comment, Item, ItemPatch, NewItem, DEFAULT_PAGE_SIZE};
use crate::models::list::{Column, List, ListPatch, NewColumn, NewList};
use crate::models::membership::Role;
use crate::models::scope::TenantScope;
use crate::models::share::{ResourceShare, ResourceType, ShareRole};

// Lists

pub async fn create_list(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    mut data: NewList,
) -> EngineResult<List> {
    data.name = required("List name", &data.name)?;

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let list = List::create(&mut *tx, &access.scope, data, actor.user_id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ListCreate, EntityType::List, Some(list.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": list.name })),
    )
    .await?;

    tx.commit().await?;
    Ok(list)
}

pub async fn list_lists(pool: &PgPool, actor: &Actor, workspace_id: Uuid) -> EngineResult<Vec<List>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    Ok(List::list(pool, &access.scope).await?)
}

pub async fn get_list(pool: &PgPool, actor: &Actor, workspace_id: Uuid, list_id: Uuid) -> EngineResult<List> {
    let mut conn = pool.acquire().await?;
    let access = authorize_resource(
        &mut conn,
        actor,
        workspace_id,
        ResourceRef::list(list_id),
        Role::ALL,
        ShareRole::Viewer,
    )
    .await?;

    List::find(&mut *conn, &access.scope, list_id)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))
}

pub async fn update_list(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
    patch: ListPatch,
) -> EngineResult<List> {
    if let Some(name) = patch.name.as_ref().into_option() {
        required("List name", name)?;
    }

    let mut tx = pool.begin().await?;
    let access = authorize_resource(
        &mut tx,
        actor,
        workspace_id,
        ResourceRef::list(list_id),
        Role::EDITORS,
        ShareRole::Editor,
    )
    .await?;

    let mut list = List::find_for_update(&mut tx, &access.scope, list_id)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))?;

    let diff = patch.apply(&mut list);
    if diff.is_empty() {
        tx.rollback().await?;
        return Ok(list);
    }

    let list = list.save(&mut *tx, &access.scope).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ListUpdate, EntityType::List, Some(list.id))
            .actor(Some(actor.user_id))
            .diff(JsonValue::Object(diff)),
    )
    .await?;

    tx.commit().await?;
    Ok(list)
}

pub async fn archive_list(pool: &PgPool, actor: &Actor, workspace_id: Uuid, list_id: Uuid) -> EngineResult<List> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let list = List::archive(&mut *tx, &access.scope, list_id)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))?;

    let shares_removed =
        ResourceShare::delete_for_resource(&mut *tx, &access.scope, ResourceType::List, list.id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ListDelete, EntityType::List, Some(list.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "name": list.name, "shares_removed": shares_removed })),
    )
    .await?;

    tx.commit().await?;
    Ok(list)
}

// Columns

pub async fn create_column(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
    mut data: NewColumn,
) -> EngineResult<Column> {
    data.key = required("Column key", &data.key)?;
    data.name = required("Column name", &data.name)?;
    data.column_type = required("Column type", &data.column_type)?;

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let column = Column::create(&mut *tx, &access.scope, list_id, data)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ColumnCreate, EntityType::Column, Some(column.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "list_id": list_id,
                "key": column.key,
                "name": column.name,
                "column_type": column.column_type,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(column)
}

pub async fn list_columns(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
) -> EngineResult<Vec<Column>> {
    let mut conn = pool.acquire().await?;
    let access = authorize_resource(
        &mut conn,
        actor,
        workspace_id,
        ResourceRef::list(list_id),
        Role::ALL,
        ShareRole::Viewer,
    )
    .await?;

    Ok(Column::list_for_list(&mut *conn, &access.scope, list_id).await?)
}

pub async fn delete_column(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
    column_id: Uuid,
) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let column = Column::delete(&mut *tx, &access.scope, list_id, column_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Column"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ColumnDelete, EntityType::Column, Some(column.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "list_id": list_id, "key": column.key, "name": column.name })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

// Items

pub async fn create_item(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
    data: NewItem,
) -> EngineResult<Item> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let item = Item::create(&mut *tx, &access.scope, list_id, data, actor.user_id)
        .await?
        .ok_or_else(|| EngineError::not_found("List"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ItemCreate, EntityType::Item, Some(item.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "list_id": list_id, "title": item.title })),
    )
    .await?;

    tx.commit().await?;
    Ok(item)
}

/// Live items of a list; `limit` defaults to 100 and is clamped to `1..=1000`
pub async fn list_items(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    list_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
) -> EngineResult<Vec<Item>> {
    let mut conn = pool.acquire().await?;
    let access = authorize_resource(
        &mut conn,
        actor,
        workspace_id,
        ResourceRef::list(list_id),
        Role::ALL,
        ShareRole::Viewer,
    )
    .await?;

    Ok(Item::list_for_list(
        &mut *conn,
        &access.scope,
        list_id,
        limit.unwrap_or(DEFAULT_PAGE_SIZE),
        offset.unwrap_or(0),
    )
    .await?)
}

pub async fn get_item(pool: &PgPool, actor: &Actor, workspace_id: Uuid, item_id: Uuid) -> EngineResult<Item> {
    let mut conn = pool.acquire().await?;
    let access = authorize_resource(
        &mut conn,
        actor,
        workspace_id,
        ResourceRef::item(item_id),
        Role::ALL,
        ShareRole::Viewer,
    )
    .await?;

    Item::find(&mut *conn, &access.scope, item_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Item"))
}

/// Applies a partial update; `values` merges key-by-key and `null` removes a key
pub async fn update_item(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    item_id: Uuid,
    patch: ItemPatch,
) -> EngineResult<Item> {
    let mut tx = pool.begin().await?;
    let access = authorize_resource(
        &mut tx,
        actor,
        workspace_id,
        ResourceRef::item(item_id),
        Role::EDITORS,
        ShareRole::Editor,
    )
    .await?;

    let mut item = Item::find_for_update(&mut tx, &access.scope, item_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Item"))?;

    let diff = patch.apply(&mut item);
    if diff.is_empty() {
        tx.rollback().await?;
        return Ok(item);
    }

    let item = item.save(&mut *tx, &access.scope, actor.user_id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ItemUpdate, EntityType::Item, Some(item.id))
            .actor(Some(actor.user_id))
            .diff(JsonValue::Object(diff)),
    )
    .await?;

    tx.commit().await?;
    Ok(item)
}

pub async fn archive_item(pool: &PgPool, actor: &Actor, workspace_id: Uuid, item_id: Uuid) -> EngineResult<Item> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;

    let item = Item::archive(&mut *tx, &access.scope, item_id, actor.user_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Item"))?;

    let shares_removed =
        ResourceShare::delete_for_resource(&mut *tx, &access.scope, ResourceType::Item, item.id).await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ItemDelete, EntityType::Item, Some(item.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "list_id": item.list_id,
                "title": item.title,
                "shares_removed": shares_removed,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(item)
}

// Comments

pub async fn create_comment(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    item_id: Uuid,
    content: &str,
) -> EngineResult<Comment> {
    let content = required("Comment", content)?;

    let mut tx = pool.begin().await?;
    let access = authorize_resource(
        &mut tx,
        actor,
        workspace_id,
        ResourceRef::item(item_id),
        Role::ALL,
        ShareRole::Commenter,
    )
    .await?;

    let comment = Comment::create(&mut *tx, &access.scope, item_id, actor.user_id, &content)
        .await?
        .ok_or_else(|| EngineError::not_found("Item"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::CommentCreate, EntityType::Comment, Some(comment.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "item_id": item_id })),
    )
    .await?;

    tx.commit().await?;
    Ok(comment)
}

pub async fn list_comments(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    item_id: Uuid,
) -> EngineResult<Vec<Comment>> {
    let mut conn = pool.acquire().await?;
    let access = authorize_resource(
        &mut conn,
        actor,
        workspace_id,
        ResourceRef::item(item_id),
        Role::ALL,
        ShareRole::Viewer,
    )
    .await?;

    Ok(Comment::list_for_item(&mut *conn, &access.scope, item_id).await?)
}

/// Deletes a comment; allowed to its author and to owners and admins
///
/// The caller first needs commenter access to the item, through membership or a
/// live share. An author whose membership or share is gone sees `NotFound`.
pub async fn delete_comment(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    comment_id: Uuid,
) -> EngineResult<()> {
    let lookup = TenantScope::new(workspace_id);

    let mut tx = pool.begin().await?;
    let comment = Comment::find(&mut *tx, &lookup, comment_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Comment"))?;

    let access = authorize_resource(
        &mut tx,
        actor,
        workspace_id,
        ResourceRef::item(comment.item_id),
        Role::ALL,
        ShareRole::Commenter,
    )
    .await?;
    let scope = access.scope;

    let is_author = comment.author_id == Some(actor.user_id);
    let is_manager = matches!(access.grant, Grant::Member(role) if role.is_in(Role::MANAGERS));
    if !is_author && !is_manager {
        debug!(workspace_id = %workspace_id, comment_id = %comment_id, "Comment delete by non-author");
        return Err(EngineError::forbidden());
    }

    Comment::delete(&mut *tx, &scope, comment.id).await?;

    AuditLog::record(
        &mut tx,
        &scope,
        AuditEntry::new(Action::CommentDelete, EntityType::Comment, Some(comment.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "item_id": comment.item_id, "author_id": comment.author_id })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Trims `value` and rejects it when empty
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
    fn test_required_trims() {
        assert_eq!(required("List name", "  Leads ").unwrap(), "Leads");
    }

    #[test]
    fn test_required_rejects_blank() {
        let err = required("Comment", "   ").unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m == "Comment must not be empty"));
    }
}
