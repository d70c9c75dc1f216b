//! Routes under `/api/access-control/system/{resource}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use permset_core::{Description, Grant, ResourcePermissionService};
use permset_storage::{OrgId, ResourcePermission, TeamId, UserId};
use serde::{Deserialize, Serialize};

use crate::access::{AccessEvaluator, Caller};
use crate::backend::StoreBackend;
use crate::error::ApiError;

pub type Service = ResourcePermissionService<StoreBackend>;

#[derive(Clone)]
pub struct AppState {
    services: Arc<HashMap<String, Arc<Service>>>,
    access: Arc<dyn AccessEvaluator>,
}

impl AppState {
    pub fn new(services: Vec<Service>, access: Arc<dyn AccessEvaluator>) -> Self {
        let services = services
            .into_iter()
            .map(|s| (s.options().resource().to_string(), Arc::new(s)))
            .collect();
        Self {
            services: Arc::new(services),
            access,
        }
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        self.access.caller(headers).await
    }

    /// The service for `resource`, once `caller` holds the read or write action on it.
    fn authorize(
        &self,
        caller: &Caller,
        resource: &str,
        access: Access,
    ) -> Result<Arc<Service>, ApiError> {
        let service = self
            .services
            .get(resource)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("unknown resource {resource}")))?;
        let action = match access {
            Access::Read => service.options().read_action(),
            Access::Write => service.options().write_action(),
        };
        caller.require(&action)?;
        Ok(service)
    }
}

#[derive(Clone, Copy, Debug)]
enum Access {
    Read,
    Write,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/access-control/system/{resource}/description",
            get(get_description),
        )
        .route(
            "/api/access-control/system/{resource}/{resource_id}",
            get(get_permissions),
        )
        .route(
            "/api/access-control/system/{resource}/{resource_id}/users/{user_id}",
            post(set_user_permission),
        )
        .route(
            "/api/access-control/system/{resource}/{resource_id}/teams/{team_id}",
            post(set_team_permission),
        )
        .route(
            "/api/access-control/system/{resource}/{resource_id}/builtInRoles/{role}",
            post(set_builtin_role_permission),
        )
        .with_state(state)
}

// ───────────────────────────────────── DTOs ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePermissionDto {
    pub id: String,
    pub resource_id: String,
    pub kind: String,
    pub principal_id: String,
    pub is_managed: bool,
    pub permission: String,
    pub actions: Vec<String>,
}

impl ResourcePermissionDto {
    fn new(record: &ResourcePermission, permission: &str) -> Self {
        Self {
            id: record.id.to_string(),
            resource_id: record.resource_id.clone(),
            kind: record.principal.kind().to_string(),
            principal_id: record.principal.principal_id(),
            // Every binding written through this service is managed.
            is_managed: true,
            permission: permission.to_string(),
            actions: record.actions.iter().cloned().collect(),
        }
    }
}

/// `{"permission": "Edit"}` or `{"actions": ["dashboards:read"]}`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPermissionBody {
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

impl SetPermissionBody {
    /// Parsed only after the caller is authorized.
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::validation(format!("invalid request body: {e}")))
    }

    fn into_grant(self) -> Result<Grant, ApiError> {
        match (self.permission, self.actions) {
            (Some(_), Some(_)) => Err(ApiError::validation(
                "specify either permission or actions, not both",
            )),
            (None, Some(actions)) => Ok(Grant::actions(actions)),
            (permission, None) => Ok(Grant::Permission(permission.unwrap_or_default())),
        }
    }
}

// ─────────────────────────────────── Handlers ─────────────────────────────────────────

async fn health_handler() -> &'static str {
    "ok"
}

async fn get_description(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Description>, ApiError> {
    let caller = state.authenticate(&headers).await?;
    let service = state.authorize(&caller, &resource, Access::Read)?;
    Ok(Json(service.description()))
}

async fn get_permissions(
    State(state): State<AppState>,
    Path((resource, resource_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<ResourcePermissionDto>>, ApiError> {
    let caller = state.authenticate(&headers).await?;
    let service = state.authorize(&caller, &resource, Access::Read)?;

    let permissions = service.get_permissions(caller.org_id, &resource_id).await?;
    Ok(Json(
        permissions
            .iter()
            .map(|p| ResourcePermissionDto::new(&p.record, &p.permission))
            .collect(),
    ))
}

async fn set_user_permission(
    State(state): State<AppState>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let caller = state.authenticate(&headers).await?;
    let Path((resource, resource_id, user_id)) = path?;
    let service = state.authorize(&caller, &resource, Access::Write)?;
    let grant = SetPermissionBody::parse(&body)?.into_grant()?;

    let record = service
        .set_user_permission(caller.org_id, UserId(user_id), &resource_id, grant)
        .await?;
    Ok(set_response(&service, caller.org_id, record))
}

async fn set_team_permission(
    State(state): State<AppState>,
    path: Result<Path<(String, String, i64)>, PathRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let caller = state.authenticate(&headers).await?;
    let Path((resource, resource_id, team_id)) = path?;
    let service = state.authorize(&caller, &resource, Access::Write)?;
    let grant = SetPermissionBody::parse(&body)?.into_grant()?;

    let record = service
        .set_team_permission(caller.org_id, TeamId(team_id), &resource_id, grant)
        .await?;
    Ok(set_response(&service, caller.org_id, record))
}

async fn set_builtin_role_permission(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let caller = state.authenticate(&headers).await?;
    let Path((resource, resource_id, role)) = path?;
    let service = state.authorize(&caller, &resource, Access::Write)?;
    let grant = SetPermissionBody::parse(&body)?.into_grant()?;

    let record = service
        .set_builtin_role_permission(caller.org_id, &role, &resource_id, grant)
        .await?;
    Ok(set_response(&service, caller.org_id, record))
}

fn set_response(service: &Service, org_id: OrgId, record: Option<ResourcePermission>) -> Response {
    match record {
        Some(record) => {
            let permission = service.options().mapper().actions_to_name(&record.actions);
            Json(ResourcePermissionDto::new(&record, permission)).into_response()
        }
        None => {
            tracing::debug!(org_id = %org_id, "permission cleared");
            Json(serde_json::json!({})).into_response()
        }
    }
}
