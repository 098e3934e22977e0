/// Authentication and authorization
///
/// # Permission model
///
/// 1. **Authentication**: a bearer access token resolves to an active [`User`],
///    yielding an [`Actor`]. The token never carries a tenant.
/// 2. **Membership**: [`authorize`] looks up the actor's *accepted* membership in
///    the workspace named by the request and checks its role against an explicit
///    allowed set ([`Role::ALL`], [`Role::EDITORS`], [`Role::MANAGERS`],
///    [`Role::OWNERS`]).
/// 3. **Shares**: [`authorize_resource`] additionally accepts a user or team share
///    naming the exact list or item, with a sufficient [`ShareRole`].
///
/// Both checks hand back a [`TenantScope`] for the workspace, the only value model
/// queries accept as a tenant filter.
///
/// # Not found versus forbidden
///
/// A caller with no membership gets `NotFound("Workspace not found")`, so the
/// existence of other tenants' workspaces is not revealed. A member whose role is
/// too low gets `Forbidden`.
///
/// # Example
///
/// ```no_run
/// use warden_shared::engine::access::{authenticate, authorize};
/// use warden_shared::models::membership::Role;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, bearer: &str, workspace_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let actor = authenticate(&pool, "secret-at-least-32-characters-long", bearer).await?;
/// let access = authorize(&pool, &actor, workspace_id, Role::EDITORS).await?;
/// println!("acting as {} in {}", access.role().as_str(), access.scope.workspace_id());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use tracing::debug;
use uuid::Uuid;

use super::{EngineError, EngineResult};
use crate::auth::jwt::validate_access_token;
use crate::models::item::Item;
use crate::models::list::List;
use crate::models::membership::{Membership, Role};
use crate::models::scope::TenantScope;
use crate::models::share::{ResourceShare, ResourceType, ShareRole};
use crate::models::user::User;

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
}

/// Result of a membership check
#[derive(Debug, Clone)]
pub struct MemberAccess {
    pub scope: TenantScope,
    pub membership: Membership,
}

impl MemberAccess {
    pub fn role(&self) -> Role {
        self.membership.role
    }
}

/// A list or item addressed by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
}

impl ResourceRef {
    pub fn list(id: Uuid) -> Self {
        Self {
            resource_type: ResourceType::List,
            resource_id: id,
        }
    }

    pub fn item(id: Uuid) -> Self {
        Self {
            resource_type: ResourceType::Item,
            resource_id: id,
        }
    }
}

/// How access to a resource was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Member(Role),
    Share(ShareRole),
}

/// Result of a resource check
#[derive(Debug, Clone, Copy)]
pub struct ResourceAccess {
    pub scope: TenantScope,
    pub grant: Grant,
}

/// Resolves a bearer access token to an active user
///
/// Every failure (bad signature, expiry, wrong token type, unknown or inactive
/// user) collapses into [`EngineError::Unauthenticated`].
pub async fn authenticate<'e, E>(executor: E, secret: &str, token: &str) -> EngineResult<Actor>
where
    E: PgExecutor<'e>,
{
    let claims = validate_access_token(token, secret).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        EngineError::Unauthenticated
    })?;

    let user = User::find_by_id(executor, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "Token subject missing or inactive");
            EngineError::Unauthenticated
        })?;

    Ok(Actor {
        user_id: user.id,
        email: user.email,
    })
}

/// Requires an accepted membership with a role in `allowed`
pub async fn authorize<'e, E>(
    executor: E,
    actor: &Actor,
    workspace_id: Uuid,
    allowed: &[Role],
) -> EngineResult<MemberAccess>
where
    E: PgExecutor<'e>,
{
    let membership = Membership::find_accepted(executor, workspace_id, actor.user_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Workspace"))?;

    if !membership.role.is_in(allowed) {
        debug!(
            workspace_id = %workspace_id,
            user_id = %actor.user_id,
            role = membership.role.as_str(),
            "Role not allowed"
        );
        return Err(EngineError::forbidden());
    }

    Ok(MemberAccess {
        scope: TenantScope::new(workspace_id),
        membership,
    })
}

/// Requires a member role in `roles`, or a share on the resource of at least `share_role`
///
/// The resource must exist (and be live) inside the workspace in both cases.
pub async fn authorize_resource(
    conn: &mut PgConnection,
    actor: &Actor,
    workspace_id: Uuid,
    resource: ResourceRef,
    roles: &[Role],
    share_role: ShareRole,
) -> EngineResult<ResourceAccess> {
    let scope = TenantScope::new(workspace_id);
    let membership = Membership::find_accepted(&mut *conn, workspace_id, actor.user_id).await?;

    if let Some(membership) = &membership {
        if membership.role.is_in(roles) {
            ensure_exists(conn, &scope, resource).await?;
            return Ok(ResourceAccess {
                scope,
                grant: Grant::Member(membership.role),
            });
        }
    }

    let shared = ResourceShare::best_role_for_user(
        &mut *conn,
        &scope,
        resource.resource_type,
        resource.resource_id,
        actor.user_id,
    )
    .await?;

    match (shared, membership) {
        (Some(role), _) if role.includes(share_role) => {
            ensure_exists(conn, &scope, resource).await?;
            Ok(ResourceAccess {
                scope,
                grant: Grant::Share(role),
            })
        }
        (Some(_), _) | (None, Some(_)) => Err(EngineError::forbidden()),
        (None, None) => Err(EngineError::not_found(resource_label(resource.resource_type))),
    }
}

/// Fails with `NotFound` unless the resource is live in the scope's workspace
pub(crate) async fn ensure_exists(
    conn: &mut PgConnection,
    scope: &TenantScope,
    resource: ResourceRef,
) -> EngineResult<()> {
    let exists = match resource.resource_type {
        ResourceType::List => List::find(conn, scope, resource.resource_id).await?.is_some(),
        ResourceType::Item => Item::find(conn, scope, resource.resource_id).await?.is_some(),
    };

    if exists {
        Ok(())
    } else {
        Err(EngineError::not_found(resource_label(resource.resource_type)))
    }
}

pub(crate) fn resource_label(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::List => "List",
        ResourceType::Item => "Item",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_constructors() {
        let id = Uuid::new_v4();
        assert_eq!(ResourceRef::list(id).resource_type, ResourceType::List);
        assert_eq!(ResourceRef::item(id).resource_id, id);
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            EngineError::not_found(resource_label(ResourceType::Item)).to_string(),
            "Item not found"
        );
        assert_eq!(EngineError::not_found("Workspace").to_string(), "Workspace not found");
    }
}
