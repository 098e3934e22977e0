/// Invites and the membership lifecycle
///
/// ```text
///            invite                accept
///   (none) ─────────▶ invited ─────────────▶ accepted ──▶ (removed)
///                        │
///                        │ revoke
///                        ▼
///                     revoked
/// ```
///
/// # Last owner
///
/// A workspace always keeps at least one accepted owner. Demotion and removal lock
/// every accepted owner row first ([`Membership::lock_accepted_owners`]) and count
/// the owners left besides the target, so concurrent demotions of the last two
/// owners serialize and the second one fails.
///
/// # Owner role
///
/// Only owners grant, revoke or remove the owner role. Admins manage everyone else.
///
/// # E-mail
///
/// The invite e-mail is sent on a spawned task after the transaction commits. A
/// delivery failure is logged and the invite stays valid.

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::access::{authorize, Actor, MemberAccess};
use super::{EngineError, EngineResult};
use crate::auth::token::{self, TokenKind};
use crate::mailer::Mailer;
use crate::models::audit_log::{Action, AuditEntry, AuditLog, EntityType};
use crate::models::membership::{MemberSummary, Membership, MembershipStatus, NewInvite, Role};
use crate::models::scope::TenantScope;
use crate::models::team::TeamMember;
use crate::models::user::normalize_email;
use crate::models::workspace::Workspace;

/// Default invite lifetime
pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;

/// Invite settings taken from configuration
#[derive(Debug, Clone)]
pub struct InviteSettings {
    pub ttl: Duration,

    /// Base URL of the web app; the accept link is `{frontend_url}/accept-invite?token=...`
    pub frontend_url: String,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::days(DEFAULT_INVITE_TTL_DAYS),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl InviteSettings {
    pub fn accept_url(&self, token: &str) -> String {
        format!(
            "{}/accept-invite?token={}",
            self.frontend_url.trim_end_matches('/'),
            token
        )
    }
}

/// A freshly created invite
///
/// `token` is the only copy of the plaintext; it is not stored anywhere.
#[derive(Debug, Clone, Serialize)]
pub struct InviteIssued {
    pub membership: Membership,
    pub token: String,
    pub accept_url: String,
}

/// Invites an e-mail address into the workspace
///
/// An expired invite for the same address is revoked and replaced. A live invite or
/// an existing member is a `Conflict`.
pub async fn invite(
    pool: &PgPool,
    mailer: Arc<dyn Mailer>,
    settings: &InviteSettings,
    actor: &Actor,
    workspace_id: Uuid,
    email: &str,
    role: Role,
) -> EngineResult<InviteIssued> {
    let email = normalize_email(email);
    if !email.validate_email() {
        return Err(EngineError::Validation("Invalid email address".to_string()));
    }

    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;
    require_owner_for(&access, role, "Only owners can invite owners")?;

    if let Some(existing) = Membership::find_live_for_email(&mut *tx, &access.scope, &email).await? {
        match existing.status {
            MembershipStatus::Accepted => {
                return Err(EngineError::Conflict(
                    "User is already a member of this workspace".to_string(),
                ))
            }
            MembershipStatus::Invited if existing.expires_at.map_or(true, |at| at > Utc::now()) => {
                return Err(EngineError::Conflict("User has already been invited".to_string()))
            }
            _ => {
                Membership::revoke_invite(&mut *tx, &access.scope, existing.id).await?;
            }
        }
    }

    let workspace = Workspace::find(&mut *tx, access.scope.workspace_id())
        .await?
        .ok_or_else(|| EngineError::not_found("Workspace"))?;

    let (token, token_hash) = token::generate(TokenKind::Invite);
    let membership = Membership::create_invite(
        &mut *tx,
        &access.scope,
        NewInvite {
            email: email.clone(),
            role,
            token_hash,
            token_prefix: token::display_prefix(&token),
            invited_by: actor.user_id,
            expires_at: Utc::now() + settings.ttl,
        },
    )
    .await?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::MembershipInvite, EntityType::Membership, Some(membership.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "email": email, "role": role })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %workspace_id,
        membership_id = %membership.id,
        role = role.as_str(),
        "Invite created"
    );

    let accept_url = settings.accept_url(&token);
    let subject = format!("You're invited to {}", workspace.name);
    let body = format!(
        "You have been invited as {}. Click to accept: {}",
        role.as_str(),
        accept_url
    );
    let recipient = email;
    let membership_id = membership.id;

    tokio::spawn(async move {
        if let Err(e) = mailer.send(&subject, &recipient, &body).await {
            warn!(membership_id = %membership_id, error = %e, "Failed to send invite e-mail");
        }
    });

    Ok(InviteIssued {
        membership,
        token,
        accept_url,
    })
}

/// Accepts an invite on behalf of the authenticated caller
///
/// The token alone authorizes acceptance. Unknown, used, revoked and expired tokens
/// all read as `NotFound`.
pub async fn accept(pool: &PgPool, actor: &Actor, invite_token: &str) -> EngineResult<Membership> {
    if !token::is_well_formed(TokenKind::Invite, invite_token) {
        return Err(invalid_invite());
    }

    let mut tx = pool.begin().await?;

    let membership = Membership::accept(&mut *tx, &token::hash(invite_token), actor.user_id)
        .await?
        .ok_or_else(invalid_invite)?;

    let scope = TenantScope::new(membership.workspace_id);

    AuditLog::record(
        &mut tx,
        &scope,
        AuditEntry::new(Action::MembershipAccept, EntityType::Membership, Some(membership.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "role": membership.role, "email": membership.invite_email })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %membership.workspace_id,
        membership_id = %membership.id,
        user_id = %actor.user_id,
        "Invite accepted"
    );
    Ok(membership)
}

/// Revokes a pending invite
pub async fn revoke_invite(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    membership_id: Uuid,
) -> EngineResult<Membership> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;

    let target = Membership::find_for_update(&mut tx, &access.scope, membership_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Membership"))?;

    if target.status != MembershipStatus::Invited {
        return Err(EngineError::Conflict("Only pending invites can be revoked".to_string()));
    }
    require_owner_for(&access, target.role, "Only owners can revoke owner invites")?;

    let membership = Membership::revoke_invite(&mut *tx, &access.scope, membership_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Membership"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::MembershipRevoke, EntityType::Membership, Some(membership.id))
            .actor(Some(actor.user_id))
            .diff(json!({ "email": membership.invite_email, "role": membership.role })),
    )
    .await?;

    tx.commit().await?;
    Ok(membership)
}

/// Changes a member's role
///
/// Setting the role a member already has is a no-op and writes no audit row.
pub async fn update_role(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    membership_id: Uuid,
    new_role: Role,
) -> EngineResult<Membership> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::MANAGERS).await?;
    require_owner_for(&access, new_role, "Only owners can grant the owner role")?;

    let owners = Membership::lock_accepted_owners(&mut tx, &access.scope).await?;

    let target = Membership::find_for_update(&mut tx, &access.scope, membership_id)
        .await?
        .filter(|m| m.status != MembershipStatus::Revoked)
        .ok_or_else(|| EngineError::not_found("Membership"))?;

    require_owner_for(&access, target.role, "Only owners can change an owner's role")?;

    if target.role == new_role {
        tx.rollback().await?;
        return Ok(target);
    }

    if target.is_owner() && !has_other_owner(&owners, target.id) {
        return Err(EngineError::Conflict(
            "Cannot remove or demote the last owner".to_string(),
        ));
    }

    let membership = Membership::set_role(&mut *tx, &access.scope, membership_id, new_role)
        .await?
        .ok_or_else(|| EngineError::not_found("Membership"))?;

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::MembershipRoleChange, EntityType::Membership, Some(membership.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "user_id": membership.user_id,
                "old_role": target.role,
                "new_role": new_role,
            })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %workspace_id,
        membership_id = %membership_id,
        old_role = target.role.as_str(),
        new_role = new_role.as_str(),
        "Member role changed"
    );
    Ok(membership)
}

/// Removes a member, or deletes a pending invite row
///
/// Any member may remove themselves. Removing someone else takes owner or admin,
/// and only owners remove owners. The removed user also leaves every team of the
/// workspace.
pub async fn remove_member(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    membership_id: Uuid,
) -> EngineResult<()> {
    let mut tx = pool.begin().await?;
    let access = authorize(&mut *tx, actor, workspace_id, Role::ALL).await?;

    let owners = Membership::lock_accepted_owners(&mut tx, &access.scope).await?;

    let target = Membership::find_for_update(&mut tx, &access.scope, membership_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Membership"))?;

    let self_removal = target.user_id == Some(actor.user_id);
    if !self_removal {
        if !access.role().is_in(Role::MANAGERS) {
            return Err(EngineError::forbidden());
        }
        require_owner_for(&access, target.role, "Only owners can remove owners")?;
    }

    if target.is_owner() && !has_other_owner(&owners, target.id) {
        return Err(EngineError::Conflict("Cannot remove the last owner".to_string()));
    }

    Membership::delete(&mut *tx, &access.scope, membership_id).await?;

    let teams_left = match target.user_id {
        Some(user_id) => TeamMember::remove_user_from_all(&mut *tx, &access.scope, user_id).await?,
        None => 0,
    };

    AuditLog::record(
        &mut tx,
        &access.scope,
        AuditEntry::new(Action::MembershipRemove, EntityType::Membership, Some(target.id))
            .actor(Some(actor.user_id))
            .diff(json!({
                "user_id": target.user_id,
                "role": target.role,
                "status": target.status,
                "self_removal": self_removal,
                "teams_left": teams_left,
            })),
    )
    .await?;

    tx.commit().await?;

    info!(
        workspace_id = %workspace_id,
        membership_id = %membership_id,
        self_removal,
        "Member removed"
    );
    Ok(())
}

/// Lists accepted members and pending invites
pub async fn list_members(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
) -> EngineResult<Vec<MemberSummary>> {
    let access = authorize(pool, actor, workspace_id, Role::ALL).await?;
    Ok(Membership::list_by_workspace(pool, &access.scope).await?)
}

fn require_owner_for(access: &MemberAccess, role: Role, message: &str) -> EngineResult<()> {
    if role == Role::Owner && access.role() != Role::Owner {
        return Err(EngineError::Forbidden(message.to_string()));
    }
    Ok(())
}

fn has_other_owner(owners: &[Uuid], membership_id: Uuid) -> bool {
    owners.iter().any(|id| *id != membership_id)
}

fn invalid_invite() -> EngineError {
    EngineError::NotFound("Invalid or expired invitation".to_string())
}
