//! Injected behaviour around a permission change: resource validation before the
//! write and lifecycle hooks after it.

use std::sync::Arc;

use permset_storage::{OrgId, TeamId, UserId};

use crate::BoxError;

/// Checks that a resource id refers to something that exists and is assignable.
#[async_trait::async_trait]
pub trait ResourceValidator: Send + Sync {
    async fn validate(&self, org_id: OrgId, resource_id: &str) -> Result<(), BoxError>;
}

/// Validator that accepts every resource id.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

#[async_trait::async_trait]
impl ResourceValidator for AcceptAll {
    async fn validate(&self, _org_id: OrgId, _resource_id: &str) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Called after a permission change has been committed.
///
/// `permission` is the friendly name of the new action set, `"Custom"` when it
/// matches no configured name, or the empty string when the binding was cleared.
/// An error does not undo the committed change.
#[async_trait::async_trait]
pub trait PermissionHooks: Send + Sync {
    async fn on_set_user(
        &self,
        _org_id: OrgId,
        _user_id: UserId,
        _resource_id: &str,
        _permission: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_set_team(
        &self,
        _org_id: OrgId,
        _team_id: TeamId,
        _resource_id: &str,
        _permission: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_set_builtin_role(
        &self,
        _org_id: OrgId,
        _builtin_role: &str,
        _resource_id: &str,
        _permission: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl PermissionHooks for NoHooks {}

/// Validator and hooks handed to the service.
#[derive(Clone)]
pub struct Collaborators {
    pub validator: Arc<dyn ResourceValidator>,
    pub hooks: Arc<dyn PermissionHooks>,
}

impl Collaborators {
    pub fn with_validator(mut self, validator: Arc<dyn ResourceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PermissionHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            validator: Arc::new(AcceptAll),
            hooks: Arc::new(NoHooks),
        }
    }
}
