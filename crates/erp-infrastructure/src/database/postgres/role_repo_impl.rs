// ============================================================================
// ERP Infrastructure - PostgreSQL Role Repository
// File: crates/erp-infrastructure/src/database/postgres/role_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use erp_core::domain::Role;
use erp_core::error::DomainError;
use erp_core::repositories::RoleRepository;
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, is_unique_violation};

pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    permissions: Vec<String>,
    is_system: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            permissions: row.permissions,
            is_system: row.is_system,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, name, description, permissions, is_system, \
    created_at, created_by, modified_at, modified_by";

fn name_taken(role: &Role) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Role",
        field: "name",
        value: role.name.clone(),
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Role>, DomainError> {
        let row: Option<RoleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM roles WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find role"))?;

        Ok(row.map(Role::from))
    }

    async fn find_by_name(&self, tenant_id: &Uuid, name: &str) -> Result<Option<Role>, DomainError> {
        let row: Option<RoleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM roles WHERE tenant_id = $1 AND LOWER(name) = LOWER($2)",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find role by name"))?;

        Ok(row.map(Role::from))
    }

    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Role>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<RoleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM roles WHERE tenant_id = $1 AND id = ANY($2) ORDER BY name",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("find roles"))?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<Role>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE ($1::uuid IS NULL OR tenant_id = $1)")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count roles"))?;

        let rows: Vec<RoleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM roles
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY is_system DESC, name ASC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(scope.tenant_id())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list roles"))?;

        Ok(Page::new(rows.into_iter().map(Role::from).collect(), total, pagination))
    }

    async fn create(&self, role: &Role) -> Result<Role, DomainError> {
        let row: RoleRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, permissions, is_system, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(role.id)
        .bind(role.tenant_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(role.is_system)
        .bind(role.created_at)
        .bind(role.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return name_taken(role);
            }
            error!("Database error creating role: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn update(&self, role: &Role) -> Result<Role, DomainError> {
        let row: Option<RoleRow> = sqlx::query_as(&format!(
            r#"
            UPDATE roles SET
                name = $2, description = $3, permissions = $4,
                modified_at = $5, modified_by = $6
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(role.modified_at)
        .bind(role.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return name_taken(role);
            }
            error!("Database error updating role: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(Role::from).ok_or_else(|| DomainError::not_found("Role", role.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete role"))?;
        Ok(())
    }

    async fn count_users(&self, role_id: &Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_roles ur
            JOIN users u ON u.id = ur.user_id
            WHERE ur.role_id = $1 AND u.removed_at IS NULL
            "#,
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count role users"))
    }
}
