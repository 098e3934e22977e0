/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `workspaces`: Workspace lifecycle
/// - `members`: Members, invites and acceptance
/// - `lists`: Lists and their columns
/// - `items`: Items and comments
/// - `relationships`: Relationships between lists and their item links
/// - `teams`: Teams and team membership
/// - `shares`: User/team shares, link shares and public link resolution
/// - `views`: Saved views
/// - `audit`: Audit log reads

pub mod audit;
pub mod auth;
pub mod health;
pub mod items;
pub mod lists;
pub mod members;
pub mod relationships;
pub mod shares;
pub mod teams;
pub mod views;
pub mod workspaces;

use serde::Deserialize;
use validator::Validate;

/// `?limit=&offset=` on paged endpoints
#[derive(Debug, Default, Deserialize, Validate)]
pub struct Pagination {
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: Option<i64>,

    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        assert!(Pagination::default().validate().is_ok());
        assert!(Pagination { limit: Some(1000), offset: Some(0) }.validate().is_ok());
        assert!(Pagination { limit: Some(0), offset: None }.validate().is_err());
        assert!(Pagination { limit: Some(1001), offset: None }.validate().is_err());
        assert!(Pagination { limit: None, offset: Some(-1) }.validate().is_err());
    }
}
