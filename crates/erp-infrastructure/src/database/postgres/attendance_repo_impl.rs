// ============================================================================
// ERP Infrastructure - PostgreSQL Attendance Repository
// File: crates/erp-infrastructure/src/database/postgres/attendance_repo_impl.rs
// Description: Raw device punches and daily attendance records
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::{Attendance, AttendancePunch, AttendanceSource, AttendanceStatus};
use erp_core::error::DomainError;
use erp_core::repositories::{AttendanceFilter, AttendanceRepository, PunchFilter};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::db_error;

pub struct PgAttendanceRepository {
    pool: PgPool,
}

impl PgAttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PunchRow {
    id: Uuid,
    tenant_id: Uuid,
    employee_id: Uuid,
    employee_code: String,
    external_id: i64,
    punch_time: NaiveDateTime,
    punch_state: String,
    verify_type: Option<i32>,
    terminal_sn: Option<String>,
    synced_at: DateTime<Utc>,
}

impl From<PunchRow> for AttendancePunch {
    fn from(row: PunchRow) -> Self {
        AttendancePunch {
            id: row.id,
            tenant_id: row.tenant_id,
            employee_id: row.employee_id,
            employee_code: row.employee_code,
            external_id: row.external_id,
            punch_time: row.punch_time,
            punch_state: row.punch_state,
            verify_type: row.verify_type,
            terminal_sn: row.terminal_sn,
            synced_at: row.synced_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AttendanceRow {
    id: Uuid,
    tenant_id: Uuid,
    employee_id: Uuid,
    work_date: NaiveDate,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    worked_minutes: i32,
    status: String,
    source: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
}

impl From<AttendanceRow> for Attendance {
    fn from(row: AttendanceRow) -> Self {
        Attendance {
            id: row.id,
            tenant_id: row.tenant_id,
            employee_id: row.employee_id,
            work_date: row.work_date,
            check_in: row.check_in,
            check_out: row.check_out,
            worked_minutes: row.worked_minutes,
            status: AttendanceStatus::from_str(&row.status).unwrap_or(AttendanceStatus::Incomplete),
            source: AttendanceSource::from_str(&row.source).unwrap_or(AttendanceSource::Manual),
            notes: row.notes,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

const PUNCH_COLUMNS: &str = "id, tenant_id, employee_id, employee_code, external_id, punch_time, \
    punch_state, verify_type, terminal_sn, synced_at";

const COLUMNS: &str = "id, tenant_id, employee_id, work_date, check_in, check_out, worked_minutes, \
    status, source, notes, created_at, modified_at";

#[async_trait]
impl AttendanceRepository for PgAttendanceRepository {
    async fn upsert_punch(&self, punch: &AttendancePunch) -> Result<bool, DomainError> {
        // xmax is zero only for freshly inserted tuples.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO attendance_punches (
                id, tenant_id, employee_id, employee_code, external_id, punch_time,
                punch_state, verify_type, terminal_sn, synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tenant_id, external_id) DO UPDATE SET
                employee_id = EXCLUDED.employee_id,
                employee_code = EXCLUDED.employee_code,
                punch_time = EXCLUDED.punch_time,
                punch_state = EXCLUDED.punch_state,
                verify_type = EXCLUDED.verify_type,
                terminal_sn = EXCLUDED.terminal_sn,
                synced_at = EXCLUDED.synced_at
            RETURNING (xmax = 0)
            "#,
        )
        .bind(punch.id)
        .bind(punch.tenant_id)
        .bind(punch.employee_id)
        .bind(&punch.employee_code)
        .bind(punch.external_id)
        .bind(punch.punch_time)
        .bind(&punch.punch_state)
        .bind(punch.verify_type)
        .bind(&punch.terminal_sn)
        .bind(punch.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("upsert punch"))?;

        Ok(inserted)
    }

    async fn punches_for_day(&self, tenant_id: &Uuid, employee_id: &Uuid, work_date: NaiveDate) -> Result<Vec<AttendancePunch>, DomainError> {
        let rows: Vec<PunchRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM attendance_punches
            WHERE tenant_id = $1 AND employee_id = $2 AND punch_time::date = $3
            ORDER BY punch_time ASC
            "#,
            PUNCH_COLUMNS
        ))
        .bind(tenant_id)
        .bind(employee_id)
        .bind(work_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load day punches"))?;

        Ok(rows.into_iter().map(AttendancePunch::from).collect())
    }

    async fn list_punches(&self, scope: &TenantScope, filter: PunchFilter, pagination: Pagination) -> Result<Page<AttendancePunch>, DomainError> {
        let predicate = r#"
            ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR employee_id = $2)
              AND ($3::date IS NULL OR punch_time::date >= $3)
              AND ($4::date IS NULL OR punch_time::date <= $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM attendance_punches WHERE {}", predicate))
            .bind(scope.tenant_id())
            .bind(filter.employee_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count punches"))?;

        let rows: Vec<PunchRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendance_punches WHERE {} ORDER BY punch_time DESC LIMIT $5 OFFSET $6",
            PUNCH_COLUMNS, predicate
        ))
        .bind(scope.tenant_id())
        .bind(filter.employee_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list punches"))?;

        Ok(Page::new(rows.into_iter().map(AttendancePunch::from).collect(), total, pagination))
    }

    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Attendance>, DomainError> {
        let row: Option<AttendanceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendances WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find attendance"))?;

        Ok(row.map(Attendance::from))
    }

    async fn find_for_day(&self, tenant_id: &Uuid, employee_id: &Uuid, work_date: NaiveDate) -> Result<Option<Attendance>, DomainError> {
        let row: Option<AttendanceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendances WHERE tenant_id = $1 AND employee_id = $2 AND work_date = $3",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(employee_id)
        .bind(work_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find attendance for day"))?;

        Ok(row.map(Attendance::from))
    }

    async fn list(&self, scope: &TenantScope, filter: AttendanceFilter, pagination: Pagination) -> Result<Page<Attendance>, DomainError> {
        let predicate = r#"
            ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR employee_id = $2)
              AND ($3::date IS NULL OR work_date >= $3)
              AND ($4::date IS NULL OR work_date <= $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM attendances WHERE {}", predicate))
            .bind(scope.tenant_id())
            .bind(filter.employee_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count attendances"))?;

        let rows: Vec<AttendanceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attendances WHERE {} ORDER BY work_date DESC, employee_id LIMIT $5 OFFSET $6",
            COLUMNS, predicate
        ))
        .bind(scope.tenant_id())
        .bind(filter.employee_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list attendances"))?;

        Ok(Page::new(rows.into_iter().map(Attendance::from).collect(), total, pagination))
    }

    async fn save(&self, attendance: &Attendance) -> Result<Attendance, DomainError> {
        let row: AttendanceRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO attendances ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id, employee_id, work_date) DO UPDATE SET
                check_in = EXCLUDED.check_in,
                check_out = EXCLUDED.check_out,
                worked_minutes = EXCLUDED.worked_minutes,
                status = EXCLUDED.status,
                source = EXCLUDED.source,
                notes = EXCLUDED.notes,
                modified_at = NOW()
            RETURNING {}
            "#,
            COLUMNS, COLUMNS
        ))
        .bind(attendance.id)
        .bind(attendance.tenant_id)
        .bind(attendance.employee_id)
        .bind(attendance.work_date)
        .bind(attendance.check_in)
        .bind(attendance.check_out)
        .bind(attendance.worked_minutes)
        .bind(attendance.status.as_str())
        .bind(attendance.source.as_str())
        .bind(&attendance.notes)
        .bind(attendance.created_at)
        .bind(attendance.modified_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("save attendance"))?;

        Ok(row.into())
    }
}
