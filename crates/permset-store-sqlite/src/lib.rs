use chrono::{DateTime, Utc};
use permset_storage::{
    GetResourcesPermissionsQuery, OrgId, PermissionId, Principal, ResourcePermission,
    SetResourcePermissionCommand, Store, StoreError, TeamId, UserId,
};
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct BindingRow {
    id: String,
    principal_kind: String,
    principal_id: String,
    resource: String,
    resource_id: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    action: String,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    /// Open (creating if needed) the database at `url`, e.g. `sqlite://permset.db?mode=rwc`.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        // One connection: in-memory databases are per-connection, and a single
        // writer keeps replace transactions strictly serialized.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
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

        // Writes first, so the transaction holds the write lock before it reads anything.
        sqlx::query(
            "DELETE FROM resource_permission_action
              WHERE permission_id IN (
                    SELECT id FROM resource_permission
                     WHERE org_id=? AND resource=? AND resource_id=?
                       AND principal_kind=? AND principal_id=?)",
        )
        .bind(org_id.0)
        .bind(&cmd.resource)
        .bind(&cmd.resource_id)
        .bind(kind)
        .bind(&principal_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "DELETE FROM resource_permission
              WHERE org_id=? AND resource=? AND resource_id=?
                AND principal_kind=? AND principal_id=?",
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
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO resource_permission(id,org_id,resource,resource_id,principal_kind,principal_id,created,updated)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(org_id.0)
        .bind(&cmd.resource)
        .bind(&cmd.resource_id)
        .bind(kind)
        .bind(&principal_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::Conflict
            } else {
                StoreError::Backend(s)
            }
        })?;

        let mut insert = QueryBuilder::<Sqlite>::new(
            "INSERT INTO resource_permission_action(permission_id,action) ",
        );
        insert.push_values(cmd.actions.iter(), |mut row, action| {
            row.push_bind(id.0.to_string()).push_bind(action.clone());
        });
        insert
            .build()
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

/// Fold `(binding, action)` rows, ordered by binding, into one record per binding.
fn collect_bindings(rows: Vec<BindingRow>) -> Result<Vec<ResourcePermission>, StoreError> {
    let mut out: Vec<ResourcePermission> = Vec::new();
    let mut current: Option<String> = None;
    for row in rows {
        if current.as_deref() == Some(row.id.as_str()) {
            if let Some(last) = out.last_mut() {
                last.actions.insert(row.action);
            }
            continue;
        }
        let id = Uuid::try_parse(&row.id).map_err(|e| StoreError::Backend(e.to_string()))?;
        let principal = Principal::from_parts(&row.principal_kind, &row.principal_id)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        current = Some(row.id);
        out.push(ResourcePermission {
            id: PermissionId(id),
            principal,
            resource: row.resource,
            resource_id: row.resource_id,
            actions: [row.action].into(),
            created: row.created,
            updated: row.updated,
        });
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────────── Set ─────────────────────────────────

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

    // ───────────────────────────────── Read ────────────────────────────────

    async fn get_resources_permissions(
        &self,
        org_id: OrgId,
        query: &GetResourcesPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>, StoreError> {
        if query.resource_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, p.principal_kind, p.principal_id, p.resource, p.resource_id,
                    p.created, p.updated, a.action
               FROM resource_permission p
               JOIN resource_permission_action a ON a.permission_id=p.id
              WHERE p.org_id=",
        );
        qb.push_bind(org_id.0);
        qb.push(" AND p.resource=");
        qb.push_bind(query.resource.clone());
        qb.push(" AND p.resource_id IN (");
        let mut ids = qb.separated(", ");
        for resource_id in &query.resource_ids {
            ids.push_bind(resource_id.clone());
        }
        ids.push_unseparated(")");

        if !query.actions.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM resource_permission_action f
                               WHERE f.permission_id=p.id AND f.action IN (",
            );
            let mut actions = qb.separated(", ");
            for action in &query.actions {
                actions.push_bind(action.clone());
            }
            actions.push_unseparated("))");
        }

        qb.push(" ORDER BY p.resource_id, p.principal_kind, p.principal_id, p.id, a.action");

        let rows = qb
            .build_query_as::<BindingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        collect_bindings(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn cmd(resource_id: &str, actions: &[&str]) -> SetResourcePermissionCommand {
        SetResourcePermissionCommand::new("datasources", resource_id, actions.iter().copied())
    }

    fn query(ids: &[&str], actions: &[&str]) -> GetResourcesPermissionsQuery {
        GetResourcesPermissionsQuery {
            resource: "datasources".to_string(),
            resource_ids: ids.iter().map(|s| s.to_string()).collect(),
            actions: actions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn set_user_permission_returns_record_with_scope() {
        let s = SqliteStore::open_in_memory().await.unwrap();

        let added = s
            .set_user_resource_permission(OrgId(1), UserId(1), &cmd("1", &["datasources:query"]))
            .await
            .unwrap()
            .expect("binding");

        assert_eq!(added.principal, Principal::User(UserId(1)));
        assert_eq!(added.actions.len(), 1);
        assert_eq!(added.scope(), "datasources:id:1");
        assert_eq!(added.created, added.updated);
    }

    #[tokio::test]
    async fn replace_does_not_merge() {
        let s = SqliteStore::open_in_memory().await.unwrap();

        s.set_user_resource_permission(OrgId(1), UserId(1), &cmd("1", &["datasources:query"]))
            .await
            .unwrap();
        let replaced = s
            .set_user_resource_permission(OrgId(1), UserId(1), &cmd("1", &["datasources:write"]))
            .await
            .unwrap()
            .expect("binding");

        let expected: BTreeSet<String> = ["datasources:write".to_string()].into();
        assert_eq!(replaced.actions, expected);

        let all = s
            .get_resources_permissions(OrgId(1), &query(&["1"], &[]))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].actions, expected);
        assert_eq!(all[0].id, replaced.id);
    }

    #[tokio::test]
    async fn clearing_twice_is_idempotent() {
        let s = SqliteStore::open_in_memory().await.unwrap();

        s.set_team_resource_permission(OrgId(1), TeamId(1), &cmd("1", &["datasources:query"]))
            .await
            .unwrap();

        for _ in 0..2 {
            let cleared = s
                .set_team_resource_permission(OrgId(1), TeamId(1), &cmd("1", &[]))
                .await
                .unwrap();
            assert!(cleared.is_none());
        }

        let all = s
            .get_resources_permissions(OrgId(1), &query(&["1"], &[]))
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn org_scoping_isolation() {
        let s = SqliteStore::open_in_memory().await.unwrap();

        s.set_builtin_resource_permission(OrgId(1), "Viewer", &cmd("1", &["datasources:query"]))
            .await
            .unwrap();

        // org 2 must NOT see org 1's binding
        let other = s
            .get_resources_permissions(OrgId(2), &query(&["1"], &[]))
            .await
            .unwrap();
        assert!(other.is_empty());

        // clearing in org 2 leaves org 1 untouched
        s.set_builtin_resource_permission(OrgId(2), "Viewer", &cmd("1", &[]))
            .await
            .unwrap();
        let mine = s
            .get_resources_permissions(OrgId(1), &query(&["1"], &[]))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn action_filter_matches_any_and_returns_full_set() {
        let s = SqliteStore::open_in_memory().await.unwrap();

        s.set_user_resource_permission(
            OrgId(1),
            UserId(1),
            &cmd("1", &["datasources:query", "datasources:write"]),
        )
        .await
        .unwrap();
        s.set_user_resource_permission(OrgId(1), UserId(2), &cmd("1", &["datasources:delete"]))
            .await
            .unwrap();

        let got = s
            .get_resources_permissions(OrgId(1), &query(&["1"], &["datasources:write"]))
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].principal, Principal::User(UserId(1)));
        assert_eq!(got[0].actions.len(), 2);
    }

    #[tokio::test]
    async fn empty_resource_ids_returns_nothing() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        s.set_user_resource_permission(OrgId(1), UserId(1), &cmd("1", &["datasources:query"]))
            .await
            .unwrap();

        let got = s
            .get_resources_permissions(OrgId(1), &query(&[], &[]))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn unicode_resource_ids_roundtrip() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let id = "📊-панель";

        s.set_builtin_resource_permission(OrgId(1), "Editor", &cmd(id, &["datasources:query"]))
            .await
            .unwrap();

        let got = s
            .get_resources_permissions(OrgId(1), &query(&[id], &[]))
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].resource_id, id);
        assert_eq!(got[0].principal, Principal::BuiltInRole("Editor".to_string()));
    }
}
