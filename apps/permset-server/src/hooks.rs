use permset_core::{BoxError, PermissionHooks};
use permset_storage::{OrgId, TeamId, UserId};

/// Writes one audit line per committed permission change.
#[derive(Clone, Debug)]
pub struct TracingHooks {
    resource: String,
}

impl TracingHooks {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

#[async_trait::async_trait]
impl PermissionHooks for TracingHooks {
    async fn on_set_user(
        &self,
        org_id: OrgId,
        user_id: UserId,
        resource_id: &str,
        permission: &str,
    ) -> Result<(), BoxError> {
        tracing::info!(
            target: "permset::audit",
            org_id = %org_id,
            resource = %self.resource,
            resource_id,
            user_id = %user_id,
            permission,
            "user permission changed"
        );
        Ok(())
    }

    async fn on_set_team(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        resource_id: &str,
        permission: &str,
    ) -> Result<(), BoxError> {
        tracing::info!(
            target: "permset::audit",
            org_id = %org_id,
            resource = %self.resource,
            resource_id,
            team_id = %team_id,
            permission,
            "team permission changed"
        );
        Ok(())
    }

    async fn on_set_builtin_role(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        resource_id: &str,
        permission: &str,
    ) -> Result<(), BoxError> {
        tracing::info!(
            target: "permset::audit",
            org_id = %org_id,
            resource = %self.resource,
            resource_id,
            builtin_role,
            permission,
            "built-in role permission changed"
        );
        Ok(())
    }
}
