/// Database models for Warden
///
/// This module contains all database models and their queries.
///
/// # Models
///
/// - `user`: Global user accounts
/// - `workspace`: Tenants
/// - `membership`: User-workspace relation, roles and the invite lifecycle
/// - `list`, `item`, `relationship`, `team`: Tenant-scoped resources
/// - `saved_view`: Named filter and column presets
/// - `share`: Per-resource grants and link shares
/// - `audit_log`: Append-only audit trail
///
/// Queries on tenant-owned tables take a [`scope::TenantScope`]; see that type for
/// how one is obtained.
///
/// # Example
///
/// ```no_run
/// use warden_shared::models::user::{User, CreateUser};
/// use warden_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Jane Doe".to_string()),
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod audit_log;
pub mod item;
pub mod list;
pub mod membership;
pub mod patch;
pub mod relationship;
pub mod saved_view;
pub mod scope;
pub mod share;
pub mod team;
pub mod user;
pub mod workspace;
