//! Per-resource configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use permset_storage::PrincipalKind;

use crate::mapper::{MapperError, PermissionMapper};

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("resource name must not be empty")]
    EmptyResource,
    #[error("resource name '{0}' must not contain ':'")]
    InvalidResource(String),
    #[error(transparent)]
    Mapper(#[from] MapperError),
}

/// Which principal kinds may receive assignments on the resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignments {
    #[serde(default)]
    pub users: bool,
    #[serde(default)]
    pub teams: bool,
    #[serde(default)]
    pub built_in_roles: bool,
}

impl Assignments {
    /// Every principal kind enabled.
    pub fn all() -> Self {
        Self {
            users: true,
            teams: true,
            built_in_roles: true,
        }
    }

    pub fn allows(&self, kind: PrincipalKind) -> bool {
        match kind {
            PrincipalKind::User => self.users,
            PrincipalKind::Team => self.teams,
            PrincipalKind::BuiltInRole => self.built_in_roles,
        }
    }
}

impl Default for Assignments {
    fn default() -> Self {
        Self::all()
    }
}

/// One named permission level as it appears in a resource file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub actions: Vec<String>,
}

/// Serialized form of [`ResourcePermissionOptions`].
///
/// ```json
/// {
///   "resource": "datasources",
///   "assignments": { "users": true, "teams": true, "builtInRoles": true },
///   "permissions": [
///     { "name": "Query", "actions": ["datasources:query"] },
///     { "name": "Edit", "actions": ["datasources:query", "datasources:write"] }
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub resource: String,
    #[serde(default)]
    pub assignments: Assignments,
    pub permissions: Vec<PermissionDefinition>,
}

impl TryFrom<ResourceDefinition> for ResourcePermissionOptions {
    type Error = OptionsError;

    fn try_from(def: ResourceDefinition) -> Result<Self, Self::Error> {
        let mapper = PermissionMapper::new(
            def.permissions
                .into_iter()
                .map(|p| (p.name, p.actions)),
        )?;
        ResourcePermissionOptions::new(def.resource, def.assignments, mapper)
    }
}

/// Everything the service needs to know about the resource type it manages.
#[derive(Clone, Debug)]
pub struct ResourcePermissionOptions {
    resource: String,
    assignments: Assignments,
    mapper: PermissionMapper,
}

impl ResourcePermissionOptions {
    pub fn new(
        resource: impl Into<String>,
        assignments: Assignments,
        mapper: PermissionMapper,
    ) -> Result<Self, OptionsError> {
        let resource = resource.into();
        if resource.is_empty() {
            return Err(OptionsError::EmptyResource);
        }
        if resource.contains(':') {
            return Err(OptionsError::InvalidResource(resource));
        }
        Ok(Self {
            resource,
            assignments,
            mapper,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn assignments(&self) -> Assignments {
        self.assignments
    }

    pub fn mapper(&self) -> &PermissionMapper {
        &self.mapper
    }

    /// Action a caller needs to read assignments, e.g. `dashboards.permissions:read`.
    pub fn read_action(&self) -> String {
        format!("{}.permissions:read", self.resource)
    }

    /// Action a caller needs to change assignments.
    pub fn write_action(&self) -> String {
        format!("{}.permissions:write", self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PermissionMapper {
        PermissionMapper::new([("View", ["dashboards:read"])]).unwrap()
    }

    #[test]
    fn test_assignments_allows() {
        let a = Assignments {
            users: true,
            teams: false,
            built_in_roles: true,
        };
        assert!(a.allows(PrincipalKind::User));
        assert!(!a.allows(PrincipalKind::Team));
        assert!(a.allows(PrincipalKind::BuiltInRole));
    }

    #[test]
    fn test_options_rejects_bad_resource() {
        assert!(matches!(
            ResourcePermissionOptions::new("", Assignments::all(), mapper()),
            Err(OptionsError::EmptyResource)
        ));
        assert!(matches!(
            ResourcePermissionOptions::new("a:b", Assignments::all(), mapper()),
            Err(OptionsError::InvalidResource(_))
        ));
    }

    #[test]
    fn test_access_actions() {
        let opts = ResourcePermissionOptions::new("dashboards", Assignments::all(), mapper()).unwrap();
        assert_eq!(opts.read_action(), "dashboards.permissions:read");
        assert_eq!(opts.write_action(), "dashboards.permissions:write");
    }

    #[test]
    fn test_resource_definition_from_json() {
        let json = r#"{
            "resource": "datasources",
            "assignments": { "users": true, "builtInRoles": true },
            "permissions": [
                { "name": "Query", "actions": ["datasources:query"] },
                { "name": "Edit", "actions": ["datasources:query", "datasources:write"] }
            ]
        }"#;
        let def: ResourceDefinition = serde_json::from_str(json).unwrap();
        assert!(!def.assignments.teams);

        let opts = ResourcePermissionOptions::try_from(def).unwrap();
        assert_eq!(opts.resource(), "datasources");
        assert_eq!(opts.mapper().permissions(), vec!["Query", "Edit"]);
        assert!(opts.assignments().built_in_roles);
    }

    #[test]
    fn test_resource_definition_missing_assignments_enables_all() {
        let json = r#"{"resource":"folders","permissions":[{"name":"View","actions":["folders:read"]}]}"#;
        let def: ResourceDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.assignments, Assignments::all());
    }

    #[test]
    fn test_resource_definition_propagates_mapper_errors() {
        let def = ResourceDefinition {
            resource: "folders".into(),
            assignments: Assignments::all(),
            permissions: vec![],
        };
        assert!(matches!(
            ResourcePermissionOptions::try_from(def),
            Err(OptionsError::Mapper(MapperError::Empty))
        ));
    }
}
