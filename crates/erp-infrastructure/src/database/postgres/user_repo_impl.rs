// ============================================================================
// ERP Infrastructure - PostgreSQL User Repository
// File: crates/erp-infrastructure/src/database/postgres/user_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{error, info};
use uuid::Uuid;

use erp_core::domain::User;
use erp_core::error::DomainError;
use erp_core::repositories::{UserFilter, UserRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{is_unique_violation, like_pattern};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct UserRow {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_super_admin: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            is_super_admin: row.is_super_admin,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
            removed_at: row.removed_at,
            removed_by: row.removed_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, name, email, password_hash, is_super_admin, is_active, \
    last_login_at, created_at, created_by, modified_at, modified_by, removed_at, removed_by";

fn email_taken(user: &User) -> DomainError {
    DomainError::AlreadyExists {
        entity: "User",
        field: "email",
        value: user.email.clone(),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users
            WHERE id = $1 AND removed_at IS NULL
              AND ($2::uuid IS NULL OR tenant_id = $2)
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding user by id: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) AND removed_at IS NULL",
            COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding user by email: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, scope: &TenantScope, filter: UserFilter, pagination: Pagination) -> Result<Page<User>, DomainError> {
        let pattern = like_pattern(filter.search);
        let predicate = r#"
            removed_at IS NULL
              AND ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
              AND ($3::bool IS NULL OR is_active = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {}", predicate))
            .bind(scope.tenant_id())
            .bind(&pattern)
            .bind(filter.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error counting users: {}", e);
                DomainError::DatabaseError(e.to_string())
            })?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            COLUMNS, predicate
        ))
        .bind(scope.tenant_id())
        .bind(&pattern)
        .bind(filter.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error listing users: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(Page::new(rows.into_iter().map(User::from).collect(), total, pagination))
    }

    async fn count_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND removed_at IS NULL")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error counting tenant users: {}", e);
                DomainError::DatabaseError(e.to_string())
            })
    }

    async fn create(&self, user: &User) -> Result<User, DomainError> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (
                id, tenant_id, name, email, password_hash, is_super_admin, is_active,
                created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_super_admin)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return email_taken(user);
            }
            error!("Database error creating user: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        info!(user_id = %row.id, "User created");
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = $2, email = $3, password_hash = $4,
                is_super_admin = $5, is_active = $6, last_login_at = $7,
                modified_at = $8, modified_by = $9,
                removed_at = $10, removed_by = $11
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_super_admin)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.modified_at)
        .bind(user.modified_by)
        .bind(user.removed_at)
        .bind(user.removed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return email_taken(user);
            }
            error!("Database error updating user: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(User::from)
            .ok_or_else(|| DomainError::not_found("User", user.id))
    }

    async fn role_ids(&self, user_id: &Uuid) -> Result<Vec<Uuid>, DomainError> {
        sqlx::query_scalar("SELECT role_id FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error loading user roles: {}", e);
                DomainError::DatabaseError(e.to_string())
            })
    }

    async fn set_roles(&self, user_id: &Uuid, role_ids: &[Uuid]) -> Result<(), DomainError> {
        let map_err = |e: sqlx::Error| {
            error!("Database error assigning roles: {}", e);
            DomainError::DatabaseError(e.to_string())
        };

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        if !role_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn permissions_for(&self, user_id: &Uuid) -> Result<Vec<String>, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT UNNEST(r.permissions)
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error loading permissions: {}", e);
            DomainError::DatabaseError(e.to_string())
        })
    }
}
