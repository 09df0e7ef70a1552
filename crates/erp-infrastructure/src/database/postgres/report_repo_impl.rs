// ============================================================================
// ERP Infrastructure - PostgreSQL Report Queries
// File: crates/erp-infrastructure/src/database/postgres/report_repo_impl.rs
// Description: Read-only aggregates for pipeline, conversion, aging and attendance reports
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::{DealStage, LeadStatus};
use erp_core::error::DomainError;
use erp_core::repositories::{AttendanceSummaryRow, OutstandingInvoice, ReportRepository, StageTotal, StatusCount};
use erp_core::TenantScope;

use super::db_error;

pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct StageTotalRow {
    stage: String,
    count: i64,
    total_value: i64,
    weighted_value: i64,
}

#[derive(Debug, FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

#[derive(Debug, FromRow)]
struct OutstandingRow {
    id: Uuid,
    due_date: NaiveDate,
    balance_due: i64,
}

#[derive(Debug, FromRow)]
struct AttendanceSummaryDbRow {
    employee_id: Uuid,
    employee_code: String,
    full_name: String,
    days_present: i64,
    days_incomplete: i64,
    worked_minutes: i64,
}

fn stage_totals(rows: Vec<StageTotalRow>) -> Vec<StageTotal> {
    rows.into_iter()
        .filter_map(|r| {
            DealStage::from_str(&r.stage).map(|stage| StageTotal {
                stage,
                count: r.count,
                total_value: r.total_value,
                weighted_value: r.weighted_value,
            })
        })
        .collect()
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn open_stage_totals(&self, scope: &TenantScope) -> Result<Vec<StageTotal>, DomainError> {
        let rows: Vec<StageTotalRow> = sqlx::query_as(
            r#"
            SELECT stage,
                   COUNT(*) AS count,
                   COALESCE(SUM(value), 0)::BIGINT AS total_value,
                   COALESCE(SUM(value * probability / 100), 0)::BIGINT AS weighted_value
            FROM deals
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND stage NOT IN ('won', 'lost')
            GROUP BY stage
            "#,
        )
        .bind(scope.tenant_id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("open stage totals"))?;

        Ok(stage_totals(rows))
    }

    async fn closed_stage_totals(&self, scope: &TenantScope, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<StageTotal>, DomainError> {
        let rows: Vec<StageTotalRow> = sqlx::query_as(
            r#"
            SELECT stage,
                   COUNT(*) AS count,
                   COALESCE(SUM(value), 0)::BIGINT AS total_value,
                   COALESCE(SUM(value * probability / 100), 0)::BIGINT AS weighted_value
            FROM deals
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND stage IN ('won', 'lost')
              AND closed_at >= $2 AND closed_at < $3
            GROUP BY stage
            "#,
        )
        .bind(scope.tenant_id())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("closed stage totals"))?;

        Ok(stage_totals(rows))
    }

    async fn lead_status_counts(&self, scope: &TenantScope, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<StatusCount>, DomainError> {
        let rows: Vec<StatusCountRow> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) AS count
            FROM leads
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND created_at >= $2 AND created_at < $3
            GROUP BY status
            "#,
        )
        .bind(scope.tenant_id())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("lead status counts"))?;

        Ok(rows
            .into_iter()
            .filter_map(|r| LeadStatus::from_str(&r.status).map(|status| StatusCount { status, count: r.count }))
            .collect())
    }

    async fn outstanding_invoices(&self, scope: &TenantScope) -> Result<Vec<OutstandingInvoice>, DomainError> {
        let rows: Vec<OutstandingRow> = sqlx::query_as(
            r#"
            SELECT id, due_date, (total - amount_paid) AS balance_due
            FROM invoices
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND status IN ('issued', 'partially_paid', 'overdue')
              AND total > amount_paid
            ORDER BY due_date ASC
            "#,
        )
        .bind(scope.tenant_id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("outstanding invoices"))?;

        Ok(rows
            .into_iter()
            .map(|r| OutstandingInvoice {
                invoice_id: r.id,
                due_date: r.due_date,
                balance_due: r.balance_due,
            })
            .collect())
    }

    async fn attendance_summary(&self, scope: &TenantScope, from: NaiveDate, to: NaiveDate) -> Result<Vec<AttendanceSummaryRow>, DomainError> {
        // Active employees appear even with no records in the range.
        let rows: Vec<AttendanceSummaryDbRow> = sqlx::query_as(
            r#"
            SELECT e.id AS employee_id, e.employee_code, e.full_name,
                   COUNT(a.id) FILTER (WHERE a.status = 'present') AS days_present,
                   COUNT(a.id) FILTER (WHERE a.status = 'incomplete') AS days_incomplete,
                   COALESCE(SUM(a.worked_minutes), 0)::BIGINT AS worked_minutes
            FROM employees e
            LEFT JOIN attendances a
                   ON a.employee_id = e.id AND a.work_date BETWEEN $2 AND $3
            WHERE ($1::uuid IS NULL OR e.tenant_id = $1)
              AND (e.is_active OR a.id IS NOT NULL)
            GROUP BY e.id, e.employee_code, e.full_name
            ORDER BY e.employee_code ASC
            "#,
        )
        .bind(scope.tenant_id())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("attendance summary"))?;

        Ok(rows
            .into_iter()
            .map(|r| AttendanceSummaryRow {
                employee_id: r.employee_id,
                employee_code: r.employee_code,
                full_name: r.full_name,
                days_present: r.days_present,
                days_incomplete: r.days_incomplete,
                worked_minutes: r.worked_minutes,
            })
            .collect())
    }
}
