// ============================================================================
// ERP Infrastructure - PostgreSQL Audit Log Repository
// File: crates/erp-infrastructure/src/database/postgres/audit_log_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::AuditLog;
use erp_core::error::DomainError;
use erp_core::repositories::{AuditLogFilter, AuditLogRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::db_error;

pub struct PgAuditLogRepository {
    pool: PgPool,
}

impl PgAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    tenant_id: Option<Uuid>,
    user_id: Option<Uuid>,
    action: String,
    auditable_type: String,
    auditable_id: Option<Uuid>,
    event: String,
    old_values: Option<Value>,
    new_values: Option<Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLog {
    fn from(row: AuditLogRow) -> Self {
        AuditLog {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            action: row.action,
            auditable_type: row.auditable_type,
            auditable_id: row.auditable_id,
            event: row.event,
            old_values: row.old_values,
            new_values: row.new_values,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, user_id, action, auditable_type, auditable_id, event, \
    old_values, new_values, ip_address, user_agent, created_at";

const PREDICATE: &str = r#"
    ($1::uuid IS NULL OR tenant_id = $1)
      AND ($2::text IS NULL OR auditable_type = $2)
      AND ($3::uuid IS NULL OR auditable_id = $3)
      AND ($4::uuid IS NULL OR user_id = $4)
      AND ($5::text IS NULL OR action = $5)
"#;

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn create(&self, log: &AuditLog) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO audit_logs ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            COLUMNS
        ))
        .bind(log.id)
        .bind(log.tenant_id)
        .bind(log.user_id)
        .bind(&log.action)
        .bind(&log.auditable_type)
        .bind(log.auditable_id)
        .bind(&log.event)
        .bind(&log.old_values)
        .bind(&log.new_values)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("write audit log"))?;
        Ok(())
    }

    async fn list(&self, scope: &TenantScope, filter: AuditLogFilter, pagination: Pagination) -> Result<Page<AuditLog>, DomainError> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs WHERE {}", PREDICATE))
            .bind(scope.tenant_id())
            .bind(&filter.auditable_type)
            .bind(filter.auditable_id)
            .bind(filter.user_id)
            .bind(&filter.action)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count audit logs"))?;

        let rows: Vec<AuditLogRow> = sqlx::query_as(&format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT $6 OFFSET $7",
            COLUMNS, PREDICATE
        ))
        .bind(scope.tenant_id())
        .bind(&filter.auditable_type)
        .bind(filter.auditable_id)
        .bind(filter.user_id)
        .bind(&filter.action)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list audit logs"))?;

        Ok(Page::new(rows.into_iter().map(AuditLog::from).collect(), total, pagination))
    }
}
