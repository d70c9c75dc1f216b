//! Friendly permission names and the action sets they expand to.

use std::collections::BTreeSet;

use thiserror::Error;

/// Name reported for an action set that matches no configured permission exactly.
pub const CUSTOM_PERMISSION: &str = "Custom";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapperError {
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
    #[error("at least one permission must be configured")]
    Empty,
    #[error("permission names must not be empty")]
    EmptyName,
    #[error("permission '{0}' is reserved")]
    ReservedName(String),
    #[error("permission '{0}' is configured more than once")]
    DuplicateName(String),
    #[error("permission '{0}' must map to at least one non-empty action")]
    EmptyActions(String),
}

/// Ordered mapping from permission name to action set.
///
/// Order is the configured order and decides both display order and which name
/// wins when two names map to the same action set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionMapper {
    entries: Vec<(String, BTreeSet<String>)>,
}

impl PermissionMapper {
    pub fn new<I, N, A, S>(entries: I) -> Result<Self, MapperError>
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<(String, BTreeSet<String>)> = Vec::new();
        for (name, actions) in entries {
            let name = name.into();
            if name.is_empty() {
                return Err(MapperError::EmptyName);
            }
            if name == CUSTOM_PERMISSION {
                return Err(MapperError::ReservedName(name));
            }
            if out.iter().any(|(existing, _)| *existing == name) {
                return Err(MapperError::DuplicateName(name));
            }
            let actions: BTreeSet<String> = actions.into_iter().map(Into::into).collect();
            if actions.is_empty() || actions.iter().any(String::is_empty) {
                return Err(MapperError::EmptyActions(name));
            }
            out.push((name, actions));
        }
        if out.is_empty() {
            return Err(MapperError::Empty);
        }
        Ok(Self { entries: out })
    }

    /// Actions granted by `permission`.
    pub fn resolve(&self, permission: &str) -> Result<&BTreeSet<String>, MapperError> {
        self.entries
            .iter()
            .find(|(name, _)| name == permission)
            .map(|(_, actions)| actions)
            .ok_or_else(|| MapperError::UnknownPermission(permission.to_string()))
    }

    /// First configured name whose action set equals `actions`, else [`CUSTOM_PERMISSION`].
    pub fn actions_to_name(&self, actions: &BTreeSet<String>) -> &str {
        self.entries
            .iter()
            .find(|(_, mapped)| mapped == actions)
            .map(|(name, _)| name.as_str())
            .unwrap_or(CUSTOM_PERMISSION)
    }

    /// Configured names in order.
    pub fn permissions(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Union of every configured action.
    pub fn all_actions(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|(_, actions)| actions.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PermissionMapper {
        PermissionMapper::new([
            ("View", vec!["dashboards:read"]),
            ("Edit", vec!["dashboards:read", "dashboards:write"]),
            (
                "Admin",
                vec![
                    "dashboards:read",
                    "dashboards:write",
                    "dashboards.permissions:read",
                    "dashboards.permissions:write",
                ],
            ),
        ])
        .unwrap()
    }

    fn set(actions: &[&str]) -> BTreeSet<String> {
        actions.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_resolve_known_permission() {
        let m = mapper();
        assert_eq!(
            m.resolve("Edit").unwrap(),
            &set(&["dashboards:read", "dashboards:write"])
        );
    }

    #[test]
    fn test_resolve_unknown_permission() {
        let m = mapper();
        assert_eq!(
            m.resolve("Owner").unwrap_err(),
            MapperError::UnknownPermission("Owner".to_string())
        );
        // Case sensitive
        assert!(m.resolve("edit").is_err());
    }

    #[test]
    fn test_actions_to_name_exact_match() {
        let m = mapper();
        assert_eq!(m.actions_to_name(&set(&["dashboards:read"])), "View");
        assert_eq!(
            m.actions_to_name(&set(&["dashboards:write", "dashboards:read"])),
            "Edit"
        );
    }

    #[test]
    fn test_actions_to_name_custom() {
        let m = mapper();
        // partial set
        assert_eq!(m.actions_to_name(&set(&["dashboards:write"])), CUSTOM_PERMISSION);
        // superset of a named permission
        assert_eq!(
            m.actions_to_name(&set(&["dashboards:read", "dashboards:delete"])),
            CUSTOM_PERMISSION
        );
        assert_eq!(m.actions_to_name(&set(&[])), CUSTOM_PERMISSION);
    }

    #[test]
    fn test_actions_to_name_first_match_wins() {
        let m = PermissionMapper::new([
            ("Query", vec!["datasources:query"]),
            ("Use", vec!["datasources:query"]),
        ])
        .unwrap();
        assert_eq!(m.actions_to_name(&set(&["datasources:query"])), "Query");
    }

    #[test]
    fn test_permissions_keep_configured_order() {
        assert_eq!(mapper().permissions(), vec!["View", "Edit", "Admin"]);
    }

    #[test]
    fn test_all_actions() {
        assert_eq!(mapper().all_actions().len(), 4);
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        let none: Vec<(&str, Vec<&str>)> = vec![];
        assert_eq!(PermissionMapper::new(none).unwrap_err(), MapperError::Empty);
        assert_eq!(
            PermissionMapper::new([("", vec!["a:read"])]).unwrap_err(),
            MapperError::EmptyName
        );
        assert_eq!(
            PermissionMapper::new([("Custom", vec!["a:read"])]).unwrap_err(),
            MapperError::ReservedName("Custom".to_string())
        );
        assert_eq!(
            PermissionMapper::new([("View", vec!["a:read"]), ("View", vec!["a:write"])])
                .unwrap_err(),
            MapperError::DuplicateName("View".to_string())
        );
        assert_eq!(
            PermissionMapper::new([("View", Vec::<&str>::new())]).unwrap_err(),
            MapperError::EmptyActions("View".to_string())
        );
        assert_eq!(
            PermissionMapper::new([("View", vec![""])]).unwrap_err(),
            MapperError::EmptyActions("View".to_string())
        );
    }
}
