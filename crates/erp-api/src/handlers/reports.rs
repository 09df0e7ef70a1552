//! Read-only reports

use axum::extract::{Query, State};
use chrono::Utc;
use erp_core::services::report_service::{
    AttendanceSummaryReport, InvoiceAgingReport, LeadConversionReport, PipelineReport,
};

use crate::dto::{AgingQuery, DateRangeQuery};
use crate::error::ApiResult;
use crate::extract::Auth;
use crate::response::ok;
use crate::state::AppState;

/// GET /api/v1/reports/pipeline?from&to
pub async fn pipeline(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<PipelineReport> {
    let (from, to) = range.instants(Utc::now().date_naive())?;
    Ok(ok(state.services.reports.pipeline(&ctx, from, to).await?))
}

/// GET /api/v1/reports/lead-conversion?from&to
pub async fn lead_conversion(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<LeadConversionReport> {
    let (from, to) = range.instants(Utc::now().date_naive())?;
    Ok(ok(state.services.reports.lead_conversion(&ctx, from, to).await?))
}

/// GET /api/v1/reports/invoice-aging?as_of
pub async fn invoice_aging(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<AgingQuery>,
) -> ApiResult<InvoiceAgingReport> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(ok(state.services.reports.invoice_aging(&ctx, as_of).await?))
}

/// GET /api/v1/reports/attendance-summary?from&to
pub async fn attendance_summary(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<AttendanceSummaryReport> {
    let (from, to) = range.dates(Utc::now().date_naive())?;
    Ok(ok(state.services.reports.attendance_summary(&ctx, from, to).await?))
}
