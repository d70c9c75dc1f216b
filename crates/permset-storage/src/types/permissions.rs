//! Resource permission bindings and the commands that produce them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PermissionId, Principal};
use crate::scope::build_scope;

/// One principal's set of actions on one resource instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub id: PermissionId,
    pub principal: Principal,
    pub resource: String,
    pub resource_id: String,
    /// Never empty: a binding without actions does not exist.
    pub actions: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ResourcePermission {
    /// Canonical scope of the resource instance, derived from its components.
    pub fn scope(&self) -> String {
        build_scope(&self.resource, &self.resource_id)
    }

    /// Whether this binding holds at least one of `actions`.
    pub fn contains_any(&self, actions: &BTreeSet<String>) -> bool {
        !self.actions.is_disjoint(actions)
    }
}

/// Desired final action set for one principal on one resource instance.
///
/// Replaces whatever the principal held before; an empty `actions` set removes
/// the binding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetResourcePermissionCommand {
    pub resource: String,
    pub resource_id: String,
    pub actions: BTreeSet<String>,
}

impl SetResourcePermissionCommand {
    pub fn new<I, S>(resource: &str, resource_id: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource: resource.to_string(),
            resource_id: resource_id.to_string(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn scope(&self) -> String {
        build_scope(&self.resource, &self.resource_id)
    }
}

/// Bulk read over many instances of one resource type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetResourcesPermissionsQuery {
    pub resource: String,
    pub resource_ids: BTreeSet<String>,
    /// When non-empty, only bindings holding at least one of these actions match.
    pub actions: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;

    fn permission(actions: &[&str]) -> ResourcePermission {
        let now = Utc::now();
        ResourcePermission {
            id: PermissionId::new(),
            principal: Principal::User(UserId(1)),
            resource: "datasources".to_string(),
            resource_id: "1".to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            created: now,
            updated: now,
        }
    }

    #[test]
    fn test_scope_is_derived() {
        let p = permission(&["datasources:query"]);
        assert_eq!(p.scope(), "datasources:id:1");
    }

    #[test]
    fn test_command_deduplicates_actions() {
        let cmd = SetResourcePermissionCommand::new(
            "datasources",
            "1",
            ["datasources:query", "datasources:query", "datasources:write"],
        );
        assert_eq!(cmd.actions.len(), 2);
        assert_eq!(cmd.scope(), "datasources:id:1");
    }

    #[test]
    fn test_contains_any() {
        let p = permission(&["datasources:query", "datasources:write"]);
        let wanted: BTreeSet<String> = ["datasources:write".to_string()].into();
        let other: BTreeSet<String> = ["dashboards:read".to_string()].into();
        assert!(p.contains_any(&wanted));
        assert!(!p.contains_any(&other));
    }

    #[test]
    fn test_actions_are_sorted() {
        let p = permission(&["b:write", "a:read"]);
        let actions: Vec<&str> = p.actions.iter().map(String::as_str).collect();
        assert_eq!(actions, vec!["a:read", "b:write"]);
    }
}
