//! Principals that can hold resource permissions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};

/// Kind of principal a binding is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Team,
    BuiltInRole,
}

/// Error type for parsing PrincipalKind from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePrincipalKindError(pub String);

impl std::fmt::Display for ParsePrincipalKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid principal kind: {}", self.0)
    }
}

impl std::error::Error for ParsePrincipalKindError {}

impl FromStr for PrincipalKind {
    type Err = ParsePrincipalKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(PrincipalKind::User),
            "team" => Ok(PrincipalKind::Team),
            "builtin_role" => Ok(PrincipalKind::BuiltInRole),
            _ => Err(ParsePrincipalKindError(s.to_string())),
        }
    }
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Team => "team",
            PrincipalKind::BuiltInRole => "builtin_role",
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user, team or built-in role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(UserId),
    Team(TeamId),
    BuiltInRole(String),
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::Team(_) => PrincipalKind::Team,
            Principal::BuiltInRole(_) => PrincipalKind::BuiltInRole,
        }
    }

    /// The identifier as stored next to the kind: user id, team id or role name.
    pub fn principal_id(&self) -> String {
        match self {
            Principal::User(id) => id.0.to_string(),
            Principal::Team(id) => id.0.to_string(),
            Principal::BuiltInRole(role) => role.clone(),
        }
    }

    /// Rebuild a principal from its stored `(kind, principal_id)` columns.
    pub fn from_parts(kind: &str, principal_id: &str) -> Result<Self, ParsePrincipalKindError> {
        let invalid = || ParsePrincipalKindError(format!("{kind}:{principal_id}"));
        match kind.parse::<PrincipalKind>()? {
            PrincipalKind::User => principal_id
                .parse()
                .map(|id| Principal::User(UserId(id)))
                .map_err(|_| invalid()),
            PrincipalKind::Team => principal_id
                .parse()
                .map(|id| Principal::Team(TeamId(id)))
                .map_err(|_| invalid()),
            PrincipalKind::BuiltInRole if !principal_id.is_empty() => {
                Ok(Principal::BuiltInRole(principal_id.to_string()))
            }
            PrincipalKind::BuiltInRole => Err(invalid()),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.principal_id())
    }
}
