use serde::Serialize;
use uuid::Uuid;

/// Proof that the current caller may touch rows of one workspace
///
/// Every query on tenant-owned tables takes a `TenantScope` and filters on its
/// workspace id. Outside this crate a scope can only be obtained from
/// [`engine::access`](crate::engine::access), which builds it either from an accepted
/// membership, a share naming the resource, or the workspace stored on a link
/// share. A handler therefore cannot run a tenant query with an id taken straight
/// from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TenantScope {
    workspace_id: Uuid,
}

impl TenantScope {
    pub(crate) fn new(workspace_id: Uuid) -> Self {
        Self { workspace_id }
    }

    pub fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }
}
