//! Caller identity and permission checks for the HTTP surface.

use std::collections::BTreeSet;

use axum::http::HeaderMap;
use permset_storage::OrgId;

use crate::error::ApiError;

pub const ORG_HEADER: &str = "x-permset-org";
pub const ACTIONS_HEADER: &str = "x-permset-actions";

/// The authenticated caller: the org it acts in and the actions it holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub org_id: OrgId,
    pub actions: BTreeSet<String>,
}

impl Caller {
    pub fn require(&self, action: &str) -> Result<(), ApiError> {
        if self.actions.contains(action) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("missing permission {action}")))
        }
    }
}

/// Resolves the caller of a request.
#[async_trait::async_trait]
pub trait AccessEvaluator: Send + Sync {
    async fn caller(&self, headers: &HeaderMap) -> Result<Caller, ApiError>;
}

/// Trusts identity headers set by an authenticating gateway in front of the server.
///
/// `x-permset-org` carries the org id and `x-permset-actions` a comma separated
/// list of actions the caller holds.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderEvaluator;

#[async_trait::async_trait]
impl AccessEvaluator for HeaderEvaluator {
    async fn caller(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        let org_id = headers
            .get(ORG_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(OrgId)
            .ok_or_else(|| ApiError::unauthorized(format!("missing or invalid {ORG_HEADER}")))?;

        let actions = headers
            .get_all(ACTIONS_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Caller { org_id, actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[tokio::test]
    async fn header_evaluator_reads_org_and_actions() {
        let mut headers = HeaderMap::new();
        headers.insert(ORG_HEADER, HeaderValue::from_static("3"));
        headers.append(
            ACTIONS_HEADER,
            HeaderValue::from_static("dashboards.permissions:read, dashboards:read"),
        );
        headers.append(ACTIONS_HEADER, HeaderValue::from_static("folders:read"));

        let caller = HeaderEvaluator.caller(&headers).await.unwrap();
        assert_eq!(caller.org_id, OrgId(3));
        assert_eq!(caller.actions.len(), 3);
        assert!(caller.require("dashboards.permissions:read").is_ok());
        let denied = caller.require("dashboards.permissions:write").unwrap_err();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn header_evaluator_requires_org() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTIONS_HEADER, HeaderValue::from_static("dashboards:read"));
        let err = HeaderEvaluator.caller(&headers).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        headers.insert(ORG_HEADER, HeaderValue::from_static("main"));
        assert!(HeaderEvaluator.caller(&headers).await.is_err());
    }
}
