use chrono::{DateTime, SubsecRound, Utc};
use permset_storage::{
    GetResourcesPermissionsQuery, OrgId, PermissionId, Principal, ResourcePermission,
    SetResourcePermissionCommand, Store, StoreError, TeamId, UserId,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BindingRow {
    id: Uuid,
    principal_kind: String,
    principal_id: String,
    resource: String,
    resource_id: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    action: String,
}

impl PostgresStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn set_resource_permission(
        &self,
        org_id: OrgId,
        principal: Principal,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        let kind = principal.kind().as_str();
        let principal_id = principal.principal_id();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Serializes writers on the same tuple even when no row exists yet to lock.
        // Released automatically at commit or rollback.
        let lock_key = format!("{}|{}|{}|{}", org_id, cmd.scope(), kind, principal_id);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&lock_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Actions go with the binding via ON DELETE CASCADE.
        sqlx::query(
            "DELETE FROM resource_permission
              WHERE org_id = $1 AND resource = $2 AND resource_id = $3
                AND principal_kind = $4 AND principal_id = $5",
        )
        .bind(org_id.0)
        .bind(&cmd.resource)
        .bind(&cmd.resource_id)
        .bind(kind)
        .bind(&principal_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if cmd.actions.is_empty() {
            tx.commit()
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            return Ok(None);
        }

        let id = PermissionId::new();
        let now = db_now();

        sqlx::query(
            "INSERT INTO resource_permission(id, org_id, resource, resource_id, principal_kind, principal_id, created, updated)
             VALUES($1, $2, $3, $4, $5, $6, $7, $7)",
        )
        .bind(id.0)
        .bind(org_id.0)
        .bind(&cmd.resource)
        .bind(&cmd.resource_id)
        .bind(kind)
        .bind(&principal_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("duplicate key") || s.contains("unique constraint") {
                StoreError::Conflict
            } else {
                StoreError::Backend(s)
            }
        })?;

        let actions: Vec<String> = cmd.actions.iter().cloned().collect();
        sqlx::query(
            "INSERT INTO resource_permission_action(permission_id, action)
             SELECT $1, UNNEST($2::text[])",
        )
        .bind(id.0)
        .bind(&actions)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Some(ResourcePermission {
            id,
            principal,
            resource: cmd.resource.clone(),
            resource_id: cmd.resource_id.clone(),
            actions: cmd.actions.clone(),
            created: now,
            updated: now,
        }))
    }
}

fn collect_bindings(rows: Vec<BindingRow>) -> Result<Vec<ResourcePermission>, StoreError> {
    let mut out: Vec<ResourcePermission> = Vec::new();
    for row in rows {
        match out.last_mut() {
            Some(last) if last.id.0 == row.id => {
                last.actions.insert(row.action);
            }
            _ => {
                let principal = Principal::from_parts(&row.principal_kind, &row.principal_id)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                out.push(ResourcePermission {
                    id: PermissionId(row.id),
                    principal,
                    resource: row.resource,
                    resource_id: row.resource_id,
                    actions: [row.action].into(),
                    created: row.created,
                    updated: row.updated,
                });
            }
        }
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    // ───────────────────────────── Set ─────────────────────────────

    async fn set_user_resource_permission(
        &self,
        org_id: OrgId,
        user_id: UserId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        self.set_resource_permission(org_id, Principal::User(user_id), cmd)
            .await
    }

    async fn set_team_resource_permission(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        self.set_resource_permission(org_id, Principal::Team(team_id), cmd)
            .await
    }

    async fn set_builtin_resource_permission(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        self.set_resource_permission(org_id, Principal::BuiltInRole(builtin_role.to_string()), cmd)
            .await
    }

    // ───────────────────────────── Read ────────────────────────────

    async fn get_resources_permissions(
        &self,
        org_id: OrgId,
        query: &GetResourcesPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>, StoreError> {
        if query.resource_ids.is_empty() {
            return Ok(vec![]);
        }

        let resource_ids: Vec<String> = query.resource_ids.iter().cloned().collect();
        let actions: Vec<String> = query.actions.iter().cloned().collect();

        let rows = sqlx::query_as::<_, BindingRow>(
            "SELECT p.id, p.principal_kind, p.principal_id, p.resource, p.resource_id,
                    p.created, p.updated, a.action
               FROM resource_permission p
               JOIN resource_permission_action a ON a.permission_id = p.id
              WHERE p.org_id = $1
                AND p.resource = $2
                AND p.resource_id = ANY($3)
                AND (cardinality($4::text[]) = 0 OR EXISTS (
                        SELECT 1 FROM resource_permission_action f
                         WHERE f.permission_id = p.id AND f.action = ANY($4)))
              ORDER BY p.resource_id, p.principal_kind, p.principal_id, p.id, a.action",
        )
        .bind(org_id.0)
        .bind(&query.resource)
        .bind(&resource_ids)
        .bind(&actions)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        collect_bindings(rows)
    }
}

/// Current time at the microsecond precision `timestamptz` stores.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
