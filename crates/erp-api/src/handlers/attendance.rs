// ============================================================================
// ERP API - HR Handlers
// File: crates/erp-api/src/handlers/attendance.rs
// ============================================================================
//! Employees, attendance records, device punches and the sync trigger

use axum::extract::{Path, Query, State};
use erp_core::services::attendance_service::{CreateAttendanceInput, IntegrationInput, UpdateAttendanceInput};
use erp_core::services::employee_service::{CreateEmployeeInput, UpdateEmployeeInput};
use erp_core::services::SyncReport;
use erp_core::{Attendance, AttendanceIntegration, AttendancePunch, Employee};
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::{AttendanceQuery, SearchQuery};
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/employees
pub async fn list_employees(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Page<Employee>> {
    let page = state
        .services
        .employees
        .list(&ctx, query.employee_filter(), query.pagination())
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/employees/{id}
pub async fn get_employee(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Employee> {
    Ok(ok(state.services.employees.get(&ctx, &id).await?))
}

/// POST /api/v1/employees
pub async fn create_employee(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateEmployeeInput>,
) -> ApiCreated<Employee> {
    Ok(created(state.services.employees.create(&ctx, input).await?))
}

/// PUT /api/v1/employees/{id}
pub async fn update_employee(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateEmployeeInput>,
) -> ApiResult<Employee> {
    Ok(ok(state.services.employees.update(&ctx, &id, input).await?))
}

/// DELETE /api/v1/employees/{id}
pub async fn delete_employee(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.employees.delete(&ctx, &id).await?;
    Ok(done())
}

/// GET /api/v1/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Page<Attendance>> {
    let page = state
        .services
        .attendance
        .list(&ctx, query.attendance_filter(), query.pagination())
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/attendance/{id}
pub async fn get_attendance(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Attendance> {
    Ok(ok(state.services.attendance.get(&ctx, &id).await?))
}

/// POST /api/v1/attendance
pub async fn create_attendance(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateAttendanceInput>,
) -> ApiCreated<Attendance> {
    Ok(created(state.services.attendance.create(&ctx, input).await?))
}

/// PUT /api/v1/attendance/{id}
pub async fn update_attendance(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateAttendanceInput>,
) -> ApiResult<Attendance> {
    Ok(ok(state.services.attendance.update(&ctx, &id, input).await?))
}

/// GET /api/v1/attendance/punches
pub async fn list_punches(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Page<AttendancePunch>> {
    let page = state
        .services
        .attendance
        .list_punches(&ctx, query.punch_filter(), query.pagination())
        .await?;
    Ok(ok(page))
}

/// POST /api/v1/attendance/sync
///
/// Syncs the selected tenant. Super admins pick it with `X-Tenant-ID`.
pub async fn sync(State(state): State<AppState>, Auth(ctx): Auth) -> ApiResult<SyncReport> {
    let tenant_id = ctx.require_tenant()?;
    Ok(ok(state.services.attendance_sync.sync_tenant(&ctx, tenant_id).await?))
}

/// GET /api/v1/attendance/integration
pub async fn get_integration(State(state): State<AppState>, Auth(ctx): Auth) -> ApiResult<AttendanceIntegration> {
    Ok(ok(state.services.attendance.get_integration(&ctx).await?))
}

/// PUT /api/v1/attendance/integration
pub async fn save_integration(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<IntegrationInput>,
) -> ApiResult<AttendanceIntegration> {
    Ok(ok(state.services.attendance.save_integration(&ctx, input).await?))
}
