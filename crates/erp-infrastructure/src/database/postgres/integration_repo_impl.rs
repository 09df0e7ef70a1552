// ============================================================================
// ERP Infrastructure - PostgreSQL Attendance Integration Repository
// File: crates/erp-infrastructure/src/database/postgres/integration_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::AttendanceIntegration;
use erp_core::error::DomainError;
use erp_core::repositories::AttendanceIntegrationRepository;

use super::db_error;

pub struct PgAttendanceIntegrationRepository {
    pool: PgPool,
}

impl PgAttendanceIntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct IntegrationRow {
    id: Uuid,
    tenant_id: Uuid,
    provider: String,
    base_url: String,
    username: String,
    password: String,
    enabled: bool,
    last_synced_at: Option<DateTime<Utc>>,
    last_status: Option<String>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
}

impl From<IntegrationRow> for AttendanceIntegration {
    fn from(row: IntegrationRow) -> Self {
        AttendanceIntegration {
            id: row.id,
            tenant_id: row.tenant_id,
            provider: row.provider,
            base_url: row.base_url,
            username: row.username,
            password: row.password,
            enabled: row.enabled,
            last_synced_at: row.last_synced_at,
            last_status: row.last_status,
            last_error: row.last_error,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, provider, base_url, username, password, enabled, \
    last_synced_at, last_status, last_error, created_at, modified_at";

#[async_trait]
impl AttendanceIntegrationRepository for PgAttendanceIntegrationRepository {
    async fn find_by_tenant(&self, tenant_id: &Uuid) -> Result<Option<AttendanceIntegration>, DomainError> {
        let row: Option<IntegrationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendance_integrations WHERE tenant_id = $1",
            COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find attendance integration"))?;

        Ok(row.map(AttendanceIntegration::from))
    }

    async fn list_enabled(&self) -> Result<Vec<AttendanceIntegration>, DomainError> {
        let rows: Vec<IntegrationRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.tenant_id, i.provider, i.base_url, i.username, i.password, i.enabled,
                   i.last_synced_at, i.last_status, i.last_error, i.created_at, i.modified_at
            FROM attendance_integrations i
            JOIN tenants t ON t.id = i.tenant_id
            WHERE i.enabled AND t.is_active AND t.removed_at IS NULL
            ORDER BY i.tenant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list enabled integrations"))?;

        Ok(rows.into_iter().map(AttendanceIntegration::from).collect())
    }

    async fn save(&self, integration: &AttendanceIntegration) -> Result<AttendanceIntegration, DomainError> {
        let row: IntegrationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO attendance_integrations ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                base_url = EXCLUDED.base_url,
                username = EXCLUDED.username,
                password = EXCLUDED.password,
                enabled = EXCLUDED.enabled,
                last_synced_at = EXCLUDED.last_synced_at,
                last_status = EXCLUDED.last_status,
                last_error = EXCLUDED.last_error,
                modified_at = EXCLUDED.modified_at
            RETURNING {}
            "#,
            COLUMNS, COLUMNS
        ))
        .bind(integration.id)
        .bind(integration.tenant_id)
        .bind(&integration.provider)
        .bind(&integration.base_url)
        .bind(&integration.username)
        .bind(&integration.password)
        .bind(integration.enabled)
        .bind(integration.last_synced_at)
        .bind(&integration.last_status)
        .bind(&integration.last_error)
        .bind(integration.created_at)
        .bind(integration.modified_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("save attendance integration"))?;

        Ok(row.into())
    }
}
