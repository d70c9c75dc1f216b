//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait `permset-core` depends on.
///
/// All methods are **scoped by organization**. Every `set_*` call is a full
/// replace executed as one transaction: the existing binding for the
/// `(org, principal, resource, resource_id)` tuple is deleted and, when
/// `cmd.actions` is non-empty, a new one is inserted. `Ok(None)` means the
/// principal holds nothing on the resource afterwards.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Set ────────────────────────────────────────────

    async fn set_user_resource_permission(
        &self,
        org_id: OrgId,
        user_id: UserId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError>;

    async fn set_team_resource_permission(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError>;

    async fn set_builtin_resource_permission(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError>;

    // ───────────────────────────────────── Read ───────────────────────────────────────────

    /// One record per binding on any of `query.resource_ids` within the org.
    async fn get_resources_permissions(
        &self,
        org_id: OrgId,
        query: &GetResourcesPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>, StoreError>;
}
