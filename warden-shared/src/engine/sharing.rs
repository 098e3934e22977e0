/// User, team and link shares
///
/// # Link resolution
///
/// [`resolve_link`] is the one entry point that needs no credential. Inside a single
/// transaction it:
///
/// 1. locks the share row by token hash (`NotFound` when absent),
/// 2. rejects an expired link (`Expired`), then a spent quota (`QuotaExceeded`),
/// 3. counts the view with a conditional UPDATE that cannot pass `max_views`,
/// 4. loads the resource scoped by the share's own workspace,
/// 5. writes a `share.link.view` audit row with no actor,
///
/// and commits. If anything after step 3 fails the view is not counted. With
/// `max_views = N`, at most N resolutions ever succeed, however many run at once.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::access::{authorize, ensure_exists, resource_label, Actor, ResourceRef};
use super::{EngineError, EngineResult};
use crate::auth::token::{self, TokenKind};
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::item::{Item, MAX_PAGE_SIZE};
use crate::models::list::{Column, List};
use crate::models::membership::Role;
use crate::models::scope::TenantScope;
use crate::models::share::{Grantee, LinkState, NewGrant, NewLink, ResourceShare, ResourceType, ShareRole};
use crate::models::team::Team;
use crate::models::user::User;

/// Default link lifetime when the caller gives none
pub const DEFAULT_LINK_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub default_ttl: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::days(DEFAULT_LINK_TTL_DAYS),
        }
    }
}

/// Grantee of a user or team share as named by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    /// A registered user, looked up by e-mail
    Email(String),
    /// A team of the same workspace
    Team(Uuid),
}

#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub resource: ResourceRef,
    pub target: ShareTarget,
    pub role: ShareRole,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub resource: ResourceRef,
    pub role: ShareRole,

    /// Lifetime in days; `None` takes the configured default, `Some(0)` never expires
    pub expires_in_days: Option<u32>,

    pub max_views: Option<i32>,
}

/// A freshly minted link; `token` is the only copy of the plaintext
#[derive(Debug, Clone, Serialize)]
pub struct LinkIssued {
    pub id: Uuid,
    pub token: String,
    pub url: String,
    pub role: ShareRole,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<i32>,
}

/// Resource payload returned to a link bearer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resource_type", rename_all = "lowercase")]
pub enum SharedResource {
    List {
        list: List,
        columns: Vec<Column>,
        items: Vec<Item>,
    },
    Item {
        item: Item,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLink {
    #[serde(flatten)]
    pub resource: SharedResource,
    pub role: ShareRole,
    pub view_count: i32,
    pub max_views: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Grants a role on a list or item to a user or a team
pub async fn create_share(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    request: ShareRequest,
) -> EngineResult<ResourceShare> {
    if matches!(request.expires_at, Some(at) if at <= Utc::now()) {
        return Err(EngineError::Validation("expires_at must be in the future".to_string()));
    }

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;
    ensure_exists(&mut tx, &access.scope, request.resource).await?;

    let grantee = match &request.target {
        ShareTarget::Email(email) => {
            let user = User::find_by_email(&mut *tx, email)
                .await?
                .ok_or_else(|| EngineError::not_found("User"))?;
            Grantee::User(user.id)
        }
        ShareTarget::Team(team_id) => {
            let team = Team::find(&mut *tx, &access.scope, *team_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Team"))?;
            Grantee::Team(team.id)
        }
    };

    let share = ResourceShare::create_grant(
        &mut *tx,
        &access.scope,
        NewGrant {
            resource_type: request.resource.resource_type,
            resource_id: request.resource.resource_id,
            grantee,
            role: request.role,
            expires_at: request.expires_at,
            created_by: actor.user_id,
        },
    )
    .await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ShareCreate, EntityType::Share, Some(share.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "resource_type": share.resource_type,
                "resource_id": share.resource_id,
                "grantee_type": share.grantee_type,
                "grantee_user_id": share.grantee_user_id,
                "grantee_team_id": share.grantee_team_id,
                "role": share.role,
                "expires_at": share.expires_at,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(share)
}

/// Shares of the workspace, optionally for one resource
pub async fn list_shares(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    resource: Option<ResourceRef>,
) -> EngineResult<Vec<ResourceShare>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    let filter = resource.map(|r| (r.resource_type, r.resource_id));

    Ok(ResourceShare::list(pool, &access.scope, filter).await?)
}

pub async fn delete_share(pool: &PgPool, actor: &Actor, workspace_id: Uuid, share_id: Uuid) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    let share = ResourceShare::delete(&mut *tx, &access.scope, share_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Share"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ShareDelete, EntityType::Share, Some(share.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "resource_type": share.resource_type,
                "resource_id": share.resource_id,
                "grantee_type": share.grantee_type,
            })),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Mints an anonymous link share on a list or item
pub async fn create_link(
    pool: &PgPool,
    settings: &LinkSettings,
    actor: &Actor,
    workspace_id: Uuid,
    request: LinkRequest,
) -> EngineResult<LinkIssued> {
    if matches!(request.max_views, Some(max) if max < 1) {
        return Err(EngineError::Validation("max_views must be at least 1".to_string()));
    }

    let expires_at = link_expiry(Utc::now(), request.expires_in_days, settings.default_ttl);

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::EDITORS).await?;
    ensure_exists(&mut tx, &access.scope, request.resource).await?;

    let (token, token_hash) = token::generate(TokenKind::Link);
    let token_prefix = token::display_prefix(&token);

    let share = ResourceShare::create_link(
        &mut *tx,
        &access.scope,
        NewLink {
            resource_type: request.resource.resource_type,
            resource_id: request.resource.resource_id,
            role: request.role,
            token_hash,
            token_prefix: token_prefix.clone(),
            expires_at,
            max_views: request.max_views,
            created_by: actor.user_id,
        },
    )
    .await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::ShareLinkCreate, EntityType::Share, Some(share.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "resource_type": share.resource_type,
                "resource_id": share.resource_id,
                "token_prefix": token_prefix,
                "role": share.role,
                "expires_at": share.expires_at,
                "max_views": share.max_views,
            })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %workspace_id,
        share_id = %share.id,
        token_prefix = %token_prefix,
        "Link share created"
    );

    Ok(LinkIssued {
        id: share.id,
        url: format!("/s/{token}"),
        token,
        role: share.role,
        expires_at: share.expires_at,
        max_views: share.max_views,
    })
}

/// Resolves a link token to its resource and counts the view
pub async fn resolve_link(pool: &PgPool, link_token: &str) -> EngineResult<ResolvedLink> {
    let prefix = token::display_prefix(link_token);
    if !token::is_well_formed(TokenKind::Link, link_token) {
        debug!(token_prefix = %prefix, "Malformed link token");
        return Err(EngineError::not_found("Link"));
    }

    let mut tx = pool.begin().await?;

    let share = ResourceShare::find_link_for_update(&mut tx, &token::hash(link_token))
        .await?
        .ok_or_else(|| EngineError::not_found("Link"))?;

    match share.link_state(Utc::now()) {
        LinkState::Expired => {
            debug!(share_id = %share.id, token_prefix = %prefix, "Link expired");
            return Err(EngineError::Expired);
        }
        LinkState::Exhausted => {
            debug!(share_id = %share.id, token_prefix = %prefix, "Link view quota spent");
            return Err(EngineError::QuotaExceeded);
        }
        LinkState::Usable => {}
    }

    let view_count = ResourceShare::consume_view(&mut tx, share.id)
        .await?
        .ok_or(EngineError::QuotaExceeded)?;

    let scope = TenantScope::new(share.workspace_id);
    let resource = load_shared(&mut tx, &scope, share.resource_type, share.resource_id).await?;

    AuditLog::record(
        &mut tx,
        &scope,
        AuditEntry::new(Action::ShareLinkView, EntityType::Share, Some(share.id))
            .diff(json!({ "view_count": view_count })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %share.workspace_id,
        share_id = %share.id,
        token_prefix = %prefix,
        view_count,
        "Link resolved"
    );

    Ok(ResolvedLink {
        resource,
        role: share.role,
        view_count,
        max_views: share.max_views,
        expires_at: share.expires_at,
    })
}

async fn load_shared(
    conn: &mut PgConnection,
    scope: &TenantScope,
    resource_type: ResourceType,
    resource_id: Uuid,
) -> EngineResult<SharedResource> {
    let missing = || EngineError::not_found(resource_label(resource_type));

    match resource_type {
        ResourceType::List => {
            let list = List::find(&mut *conn, scope, resource_id).await?.ok_or_else(missing)?;
            let columns = Column::list_for_list(&mut *conn, scope, list.id).await?;
            let items = Item::list_for_list(&mut *conn, scope, list.id, MAX_PAGE_SIZE, 0).await?;
            Ok(SharedResource::List { list, columns, items })
        }
        ResourceType::Item => {
            let item = Item::find(&mut *conn, scope, resource_id).await?.ok_or_else(missing)?;
            Ok(SharedResource::Item { item })
        }
    }
}

fn link_expiry(now: DateTime<Utc>, expires_in_days: Option<u32>, default_ttl: Duration) -> Option<DateTime<Utc>> {
    match expires_in_days {
        None => Some(now + default_ttl),
        Some(0) => None,
        Some(days) => Some(now + Duration::days(i64::from(days))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_expiry_defaults_and_never() {
        let now = Utc::now();
        let ttl = Duration::days(DEFAULT_LINK_TTL_DAYS);

        assert_eq!(link_expiry(now, None, ttl), Some(now + Duration::days(30)));
        assert_eq!(link_expiry(now, Some(0), ttl), None);
        assert_eq!(link_expiry(now, Some(2), ttl), Some(now + Duration::days(2)));
    }

    #[test]
    fn test_shared_resource_is_tagged() {
        let item = Item {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            title: Some("Acme".to_string()),
            values: json!({}),
            position: 0,
            created_by: None,
            updated_by: None,
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let resolved = ResolvedLink {
            resource: SharedResource::Item { item },
            role: ShareRole::Viewer,
            view_count: 1,
            max_views: Some(2),
            expires_at: None,
        };

        let value = serde_json::to_value(&resolved).unwrap();
        assert_eq!(value["resource_type"], "item");
        assert_eq!(value["item"]["title"], "Acme");
        assert_eq!(value["view_count"], 1);
        assert_eq!(value["role"], "viewer");
    }
}
