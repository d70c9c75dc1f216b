use std::sync::Arc;

use permset_storage::*;
use permset_store_postgres::PostgresStore;
use permset_store_sqlite::SqliteStore;

/// StoreBackend abstracts over SQLite and PostgreSQL implementations
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Postgres(Arc<PostgresStore>),
}

impl StoreBackend {
    /// Open the backend named by the URL scheme; anything not `postgres:` is SQLite.
    pub async fn open(db_url: &str) -> Result<Self, StoreError> {
        if db_url.starts_with("postgres:") || db_url.starts_with("postgresql:") {
            Ok(StoreBackend::Postgres(Arc::new(
                PostgresStore::open(db_url).await?,
            )))
        } else {
            Ok(StoreBackend::Sqlite(Arc::new(SqliteStore::open(db_url).await?)))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite(_) => "sqlite",
            StoreBackend::Postgres(_) => "postgres",
        }
    }
}

#[async_trait::async_trait]
impl Store for StoreBackend {
    async fn set_user_resource_permission(
        &self,
        org_id: OrgId,
        user_id: UserId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.set_user_resource_permission(org_id, user_id, cmd).await,
            StoreBackend::Postgres(s) => s.set_user_resource_permission(org_id, user_id, cmd).await,
        }
    }

    async fn set_team_resource_permission(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.set_team_resource_permission(org_id, team_id, cmd).await,
            StoreBackend::Postgres(s) => s.set_team_resource_permission(org_id, team_id, cmd).await,
        }
    }

    async fn set_builtin_resource_permission(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        cmd: &SetResourcePermissionCommand,
    ) -> Result<Option<ResourcePermission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => {
                s.set_builtin_resource_permission(org_id, builtin_role, cmd)
                    .await
            }
            StoreBackend::Postgres(s) => {
                s.set_builtin_resource_permission(org_id, builtin_role, cmd)
                    .await
            }
        }
    }

    async fn get_resources_permissions(
        &self,
        org_id: OrgId,
        query: &GetResourcesPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_resources_permissions(org_id, query).await,
            StoreBackend::Postgres(s) => s.get_resources_permissions(org_id, query).await,
        }
    }
}
