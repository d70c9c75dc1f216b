use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use permset_storage::{
    GetResourcesPermissionsQuery, OrgId, Principal, PrincipalKind, ResourcePermission,
    SetResourcePermissionCommand, Store, StoreError, TeamId, UserId,
};

use crate::collaborators::Collaborators;
use crate::options::{Assignments, ResourcePermissionOptions};
use crate::BoxError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} assignments are disabled for {resource}")]
    AssignmentDisabled {
        kind: PrincipalKind,
        resource: String,
    },
    #[error("invalid resource id: {0:?}")]
    InvalidResourceId(String),
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
    #[error("actions must not be empty strings")]
    InvalidAction,
    #[error("resource {resource_id} failed validation: {source}")]
    ValidationFailed {
        resource_id: String,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The change was committed; only the post-commit hook failed.
    #[error("permission hook failed after commit: {source}")]
    Hook {
        permission: String,
        record: Option<Box<ResourcePermission>>,
        #[source]
        source: BoxError,
    },
}

impl ServiceError {
    /// Errors caused by the request itself rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::AssignmentDisabled { .. }
                | ServiceError::InvalidResourceId(_)
                | ServiceError::InvalidPrincipal(_)
                | ServiceError::UnknownPermission(_)
                | ServiceError::InvalidAction
                | ServiceError::ValidationFailed { .. }
        )
    }
}

/// What to grant: a configured permission name or a raw action set.
///
/// An empty name or an empty action set removes the principal's binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grant {
    Permission(String),
    Actions(BTreeSet<String>),
}

impl Grant {
    pub fn permission(name: impl Into<String>) -> Self {
        Grant::Permission(name.into())
    }

    pub fn actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Grant::Actions(actions.into_iter().map(Into::into).collect())
    }

    pub fn clear() -> Self {
        Grant::Actions(BTreeSet::new())
    }
}

/// A binding annotated with the permission name its actions map to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedPermission {
    pub record: ResourcePermission,
    pub permission: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub assignments: Assignments,
    pub permissions: Vec<String>,
}

pub struct ResourcePermissionService<S: Store> {
    store: Arc<S>,
    options: ResourcePermissionOptions,
    collaborators: Collaborators,
}

impl<S: Store> ResourcePermissionService<S> {
    pub fn new(
        store: Arc<S>,
        options: ResourcePermissionOptions,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            store,
            options,
            collaborators,
        }
    }

    pub fn options(&self) -> &ResourcePermissionOptions {
        &self.options
    }

    // ───────────────────────────────────── Set ────────────────────────────────────────────

    pub async fn set_user_permission(
        &self,
        org_id: OrgId,
        user_id: UserId,
        resource_id: &str,
        grant: Grant,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        self.set_permission(org_id, Principal::User(user_id), resource_id, grant)
            .await
    }

    pub async fn set_team_permission(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        resource_id: &str,
        grant: Grant,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        self.set_permission(org_id, Principal::Team(team_id), resource_id, grant)
            .await
    }

    pub async fn set_builtin_role_permission(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        resource_id: &str,
        grant: Grant,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        self.set_permission(
            org_id,
            Principal::BuiltInRole(builtin_role.to_string()),
            resource_id,
            grant,
        )
        .await
    }

    async fn set_permission(
        &self,
        org_id: OrgId,
        principal: Principal,
        resource_id: &str,
        grant: Grant,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        let resource = self.options.resource();

        if !self.options.assignments().allows(principal.kind()) {
            return Err(ServiceError::AssignmentDisabled {
                kind: principal.kind(),
                resource: resource.to_string(),
            });
        }
        if matches!(&principal, Principal::BuiltInRole(role) if role.trim().is_empty()) {
            return Err(ServiceError::InvalidPrincipal(
                "built-in role name must not be empty".to_string(),
            ));
        }
        if resource_id.is_empty() || resource_id.contains(':') {
            return Err(ServiceError::InvalidResourceId(resource_id.to_string()));
        }

        let actions = self.resolve_grant(grant)?;

        self.collaborators
            .validator
            .validate(org_id, resource_id)
            .await
            .map_err(|source| ServiceError::ValidationFailed {
                resource_id: resource_id.to_string(),
                source,
            })?;

        let cmd = SetResourcePermissionCommand {
            resource: resource.to_string(),
            resource_id: resource_id.to_string(),
            actions,
        };
        let record = match &principal {
            Principal::User(user_id) => {
                self.store
                    .set_user_resource_permission(org_id, *user_id, &cmd)
                    .await?
            }
            Principal::Team(team_id) => {
                self.store
                    .set_team_resource_permission(org_id, *team_id, &cmd)
                    .await?
            }
            Principal::BuiltInRole(role) => {
                self.store
                    .set_builtin_resource_permission(org_id, role, &cmd)
                    .await?
            }
        };

        let permission = match &record {
            Some(r) => self.options.mapper().actions_to_name(&r.actions).to_string(),
            None => String::new(),
        };
        tracing::info!(
            org_id = %org_id,
            resource,
            resource_id,
            principal = %principal,
            permission = %permission,
            cleared = record.is_none(),
            "resource permission set"
        );

        let hooks = &self.collaborators.hooks;
        let hooked = match &principal {
            Principal::User(user_id) => {
                hooks
                    .on_set_user(org_id, *user_id, resource_id, &permission)
                    .await
            }
            Principal::Team(team_id) => {
                hooks
                    .on_set_team(org_id, *team_id, resource_id, &permission)
                    .await
            }
            Principal::BuiltInRole(role) => {
                hooks
                    .on_set_builtin_role(org_id, role, resource_id, &permission)
                    .await
            }
        };
        if let Err(source) = hooked {
            tracing::warn!(
                org_id = %org_id,
                resource,
                resource_id,
                principal = %principal,
                error = %source,
                "permission hook failed; change stays committed"
            );
            return Err(ServiceError::Hook {
                permission,
                record: record.map(Box::new),
                source,
            });
        }

        Ok(record)
    }

    fn resolve_grant(&self, grant: Grant) -> Result<BTreeSet<String>, ServiceError> {
        match grant {
            Grant::Permission(name) if name.is_empty() => Ok(BTreeSet::new()),
            Grant::Permission(name) => self
                .options
                .mapper()
                .resolve(&name)
                .cloned()
                .map_err(|_| ServiceError::UnknownPermission(name)),
            Grant::Actions(actions) => {
                if actions.iter().any(String::is_empty) {
                    return Err(ServiceError::InvalidAction);
                }
                Ok(actions)
            }
        }
    }

    // ───────────────────────────────────── Read ───────────────────────────────────────────

    /// Every binding on one resource, restricted to the actions this resource
    /// knows about and named via the mapper.
    pub async fn get_permissions(
        &self,
        org_id: OrgId,
        resource_id: &str,
    ) -> Result<Vec<NamedPermission>, ServiceError> {
        let known = self.options.mapper().all_actions();
        let query = GetResourcesPermissionsQuery {
            resource: self.options.resource().to_string(),
            resource_ids: [resource_id.to_string()].into(),
            actions: known.clone(),
        };
        let records = self.store.get_resources_permissions(org_id, &query).await?;

        Ok(records
            .into_iter()
            .filter_map(|mut record| {
                record.actions.retain(|a| known.contains(a));
                if record.actions.is_empty() {
                    return None;
                }
                let permission = self
                    .options
                    .mapper()
                    .actions_to_name(&record.actions)
                    .to_string();
                Some(NamedPermission { record, permission })
            })
            .collect())
    }

    /// Bulk read across many resource ids. An empty `actions` set reads every binding.
    pub async fn get_resources_permissions<I, S2>(
        &self,
        org_id: OrgId,
        resource_ids: I,
        actions: BTreeSet<String>,
    ) -> Result<Vec<ResourcePermission>, ServiceError>
    where
        I: IntoIterator<Item = S2>,
        S2: Into<String>,
    {
        let query = GetResourcesPermissionsQuery {
            resource: self.options.resource().to_string(),
            resource_ids: resource_ids.into_iter().map(Into::into).collect(),
            actions,
        };
        Ok(self.store.get_resources_permissions(org_id, &query).await?)
    }

    pub fn description(&self) -> Description {
        Description {
            assignments: self.options.assignments(),
            permissions: self.options.mapper().permissions(),
        }
    }
}
