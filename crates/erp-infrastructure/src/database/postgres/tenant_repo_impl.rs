// ============================================================================
// ERP Infrastructure - PostgreSQL Tenant Repository
// File: crates/erp-infrastructure/src/database/postgres/tenant_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{error, info};
use uuid::Uuid;

use erp_core::domain::{SubscriptionPlan, Tenant};
use erp_core::error::DomainError;
use erp_core::repositories::TenantRepository;
use erp_shared::{Page, Pagination};

use super::{is_unique_violation, like_pattern};

pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    slug: String,
    is_active: bool,
    max_users: i32,
    subscription_plan: String,
    timezone: String,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
    removed_at: Option<DateTime<Utc>>,
    removed_by: Option<Uuid>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            max_users: row.max_users,
            subscription_plan: SubscriptionPlan::from_str(&row.subscription_plan).unwrap_or_default(),
            timezone: row.timezone,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
            removed_at: row.removed_at,
            removed_by: row.removed_by,
        }
    }
}

const COLUMNS: &str = "id, name, slug, is_active, max_users, subscription_plan, timezone, \
    created_at, created_by, modified_at, modified_by, removed_at, removed_by";

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tenants WHERE id = $1 AND removed_at IS NULL",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding tenant by id: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tenants WHERE slug = LOWER($1) AND removed_at IS NULL",
            COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error finding tenant by slug: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, search: Option<String>, pagination: Pagination) -> Result<Page<Tenant>, DomainError> {
        let pattern = like_pattern(search);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tenants
            WHERE removed_at IS NULL
              AND ($1::text IS NULL OR name ILIKE $1 OR slug ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error counting tenants: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        let rows: Vec<TenantRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM tenants
            WHERE removed_at IS NULL
              AND ($1::text IS NULL OR name ILIKE $1 OR slug ILIKE $1)
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error listing tenants: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(Page::new(rows.into_iter().map(Tenant::from).collect(), total, pagination))
    }

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let row: TenantRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO tenants (
                id, name, slug, is_active, max_users, subscription_plan, timezone,
                created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.is_active)
        .bind(tenant.max_users)
        .bind(tenant.subscription_plan.as_str())
        .bind(&tenant.timezone)
        .bind(tenant.created_at)
        .bind(tenant.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return DomainError::AlreadyExists {
                    entity: "Tenant",
                    field: "slug",
                    value: tenant.slug.clone(),
                };
            }
            error!("Database error creating tenant: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        info!(tenant_id = %row.id, slug = %row.slug, "Tenant created");
        Ok(row.into())
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            r#"
            UPDATE tenants SET
                name = $2, slug = $3, is_active = $4, max_users = $5,
                subscription_plan = $6, timezone = $7,
                modified_at = $8, modified_by = $9,
                removed_at = $10, removed_by = $11
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.is_active)
        .bind(tenant.max_users)
        .bind(tenant.subscription_plan.as_str())
        .bind(&tenant.timezone)
        .bind(tenant.modified_at)
        .bind(tenant.modified_by)
        .bind(tenant.removed_at)
        .bind(tenant.removed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return DomainError::AlreadyExists {
                    entity: "Tenant",
                    field: "slug",
                    value: tenant.slug.clone(),
                };
            }
            error!("Database error updating tenant: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(Tenant::from)
            .ok_or_else(|| DomainError::not_found("Tenant", tenant.id))
    }
}
