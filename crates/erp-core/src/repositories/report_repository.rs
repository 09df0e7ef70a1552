//! Read-only aggregates behind the reports

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{DealStage, LeadStatus};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTotal {
    pub stage: DealStage,
    pub count: i64,
    pub total_value: i64,
    pub weighted_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: LeadStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingInvoice {
    pub invoice_id: Uuid,
    pub due_date: NaiveDate,
    pub balance_due: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummaryRow {
    pub employee_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub days_present: i64,
    pub days_incomplete: i64,
    pub worked_minutes: i64,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Totals per stage for open deals.
    async fn open_stage_totals(&self, scope: &TenantScope) -> Result<Vec<StageTotal>, DomainError>;
    /// Won and lost totals for deals closed within `[from, to)`.
    async fn closed_stage_totals(&self, scope: &TenantScope, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<StageTotal>, DomainError>;
    /// Lead counts per status for leads created within `[from, to)`.
    async fn lead_status_counts(&self, scope: &TenantScope, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<StatusCount>, DomainError>;
    /// Issued, partially paid and overdue invoices with a positive balance.
    async fn outstanding_invoices(&self, scope: &TenantScope) -> Result<Vec<OutstandingInvoice>, DomainError>;
    /// Per-employee totals for work dates within `[from, to]`.
    async fn attendance_summary(&self, scope: &TenantScope, from: NaiveDate, to: NaiveDate) -> Result<Vec<AttendanceSummaryRow>, DomainError>;
}
