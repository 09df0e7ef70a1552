// ============================================================================
// ERP Core - Report Service
// File: crates/erp-core/src/services/report_service.rs
// Description: Pipeline, lead conversion, invoice aging and attendance reports
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{DealStage, LeadStatus};
use crate::error::DomainError;
use crate::repositories::{AttendanceSummaryRow, ReportRepository, StageTotal, StatusCount};

/// Longest range accepted by the attendance summary.
const MAX_SUMMARY_DAYS: i64 = 366;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Every open stage, including empty ones.
    pub stages: Vec<StageTotal>,
    pub open_count: i64,
    pub open_value: i64,
    pub weighted_value: i64,
    pub won_count: i64,
    pub won_value: i64,
    pub lost_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadConversionReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub by_status: Vec<StatusCount>,
    pub total: i64,
    pub converted: i64,
    /// Percentage, two decimals.
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingBucket {
    pub label: &'static str,
    pub count: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceAgingReport {
    pub as_of: NaiveDate,
    pub buckets: Vec<AgingBucket>,
    pub total_outstanding: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSummaryReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub employees: Vec<AttendanceSummaryRow>,
}

/// `(label, lowest days past due)`; a bucket runs until the next one starts.
const AGING_BUCKETS: [(&str, i64); 5] = [
    ("current", i64::MIN),
    ("1-30", 1),
    ("31-60", 31),
    ("61-90", 61),
    ("90+", 91),
];

pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportRepository>) -> Self {
        Self { reports }
    }

    pub async fn pipeline(&self, ctx: &RequestContext, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<PipelineReport, DomainError> {
        self.authorize(ctx)?;
        check_range(from, to)?;

        let open = self.reports.open_stage_totals(&ctx.scope).await?;
        let closed = self.reports.closed_stage_totals(&ctx.scope, from, to).await?;

        let stages: Vec<StageTotal> = DealStage::OPEN
            .iter()
            .map(|stage| {
                open.iter()
                    .find(|t| t.stage == *stage)
                    .cloned()
                    .unwrap_or(StageTotal {
                        stage: *stage,
                        count: 0,
                        total_value: 0,
                        weighted_value: 0,
                    })
            })
            .collect();
        let closed_total = |stage: DealStage| closed.iter().find(|t| t.stage == stage);

        Ok(PipelineReport {
            from,
            to,
            open_count: stages.iter().map(|s| s.count).sum(),
            open_value: stages.iter().map(|s| s.total_value).sum(),
            weighted_value: stages.iter().map(|s| s.weighted_value).sum(),
            won_count: closed_total(DealStage::Won).map_or(0, |t| t.count),
            won_value: closed_total(DealStage::Won).map_or(0, |t| t.total_value),
            lost_count: closed_total(DealStage::Lost).map_or(0, |t| t.count),
            stages,
        })
    }

    pub async fn lead_conversion(&self, ctx: &RequestContext, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<LeadConversionReport, DomainError> {
        self.authorize(ctx)?;
        check_range(from, to)?;

        let counts = self.reports.lead_status_counts(&ctx.scope, from, to).await?;
        let by_status: Vec<StatusCount> = LeadStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: counts
                    .iter()
                    .filter(|c| c.status == *status)
                    .map(|c| c.count)
                    .sum(),
            })
            .collect();
        let total: i64 = by_status.iter().map(|s| s.count).sum();
        let converted = by_status
            .iter()
            .find(|s| s.status == LeadStatus::Converted)
            .map_or(0, |s| s.count);

        Ok(LeadConversionReport {
            from,
            to,
            by_status,
            total,
            converted,
            conversion_rate: conversion_rate(converted, total),
        })
    }

    pub async fn invoice_aging(&self, ctx: &RequestContext, as_of: NaiveDate) -> Result<InvoiceAgingReport, DomainError> {
        self.authorize(ctx)?;
        let outstanding = self.reports.outstanding_invoices(&ctx.scope).await?;

        let mut buckets: Vec<AgingBucket> = AGING_BUCKETS
            .iter()
            .map(|(label, _)| AgingBucket {
                label: *label,
                count: 0,
                amount: 0,
            })
            .collect();
        for invoice in &outstanding {
            let days = (as_of - invoice.due_date).num_days();
            let idx = bucket_index(days);
            buckets[idx].count += 1;
            buckets[idx].amount += invoice.balance_due;
        }

        Ok(InvoiceAgingReport {
            as_of,
            total_outstanding: buckets.iter().map(|b| b.amount).sum(),
            buckets,
        })
    }

    pub async fn attendance_summary(&self, ctx: &RequestContext, from: NaiveDate, to: NaiveDate) -> Result<AttendanceSummaryReport, DomainError> {
        self.authorize(ctx)?;
        if to < from {
            return Err(DomainError::ValidationError("to must not be before from".into()));
        }
        if (to - from).num_days() >= MAX_SUMMARY_DAYS {
            return Err(DomainError::ValidationError(format!(
                "date range must not exceed {} days",
                MAX_SUMMARY_DAYS
            )));
        }
        let employees = self.reports.attendance_summary(&ctx.scope, from, to).await?;
        Ok(AttendanceSummaryReport { from, to, employees })
    }

    fn authorize(&self, ctx: &RequestContext) -> Result<(), DomainError> {
        let tenant: Option<Uuid> = ctx.scope.tenant_id();
        ResourcePolicy::REPORTS.authorize(&ctx.actor, Ability::View, tenant)
    }
}

fn check_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), DomainError> {
    if to <= from {
        return Err(DomainError::ValidationError("to must be after from".into()));
    }
    Ok(())
}

fn bucket_index(days_past_due: i64) -> usize {
    AGING_BUCKETS
        .iter()
        .rposition(|(_, min)| days_past_due >= *min)
        .unwrap_or(0)
}

fn conversion_rate(converted: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (converted as f64 * 10_000.0 / total as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::{MockReportRepository, OutstandingInvoice};
    use crate::tenancy::TenantScope;
    use chrono::Duration;

    fn ctx(grants: &[&str]) -> RequestContext {
        let tenant = Uuid::new_v4();
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant), false, grants.iter().map(|g| g.to_string()).collect()),
            TenantScope::Tenant(tenant),
            RequestMeta::default(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket_index(-5), 0);
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(1), 1);
        assert_eq!(bucket_index(30), 1);
        assert_eq!(bucket_index(31), 2);
        assert_eq!(bucket_index(90), 3);
        assert_eq!(bucket_index(91), 4);
    }

    #[test]
    fn test_conversion_rate_rounding() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(1, 3), 33.33);
        assert_eq!(conversion_rate(2, 3), 66.67);
    }

    #[tokio::test]
    async fn test_invoice_aging() {
        let as_of = date(2024, 6, 30);
        let mut repo = MockReportRepository::new();
        repo.expect_outstanding_invoices().returning(move |_| {
            Ok(vec![
                OutstandingInvoice { invoice_id: Uuid::new_v4(), due_date: date(2024, 7, 15), balance_due: 100 },
                OutstandingInvoice { invoice_id: Uuid::new_v4(), due_date: date(2024, 6, 20), balance_due: 200 },
                OutstandingInvoice { invoice_id: Uuid::new_v4(), due_date: date(2024, 5, 1), balance_due: 300 },
                OutstandingInvoice { invoice_id: Uuid::new_v4(), due_date: date(2024, 1, 1), balance_due: 400 },
            ])
        });

        let svc = ReportService::new(Arc::new(repo));
        let report = svc.invoice_aging(&ctx(&["reports.view"]), as_of).await.unwrap();
        let amounts: Vec<i64> = report.buckets.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![100, 200, 300, 0, 400]);
        assert_eq!(report.total_outstanding, 1_000);
    }

    #[tokio::test]
    async fn test_pipeline_fills_empty_stages() {
        let mut repo = MockReportRepository::new();
        repo.expect_open_stage_totals().returning(|_| {
            Ok(vec![StageTotal {
                stage: DealStage::Proposal,
                count: 2,
                total_value: 1_000,
                weighted_value: 500,
            }])
        });
        repo.expect_closed_stage_totals().returning(|_, _, _| {
            Ok(vec![
                StageTotal { stage: DealStage::Won, count: 1, total_value: 700, weighted_value: 700 },
                StageTotal { stage: DealStage::Lost, count: 3, total_value: 900, weighted_value: 0 },
            ])
        });

        let svc = ReportService::new(Arc::new(repo));
        let to = Utc::now();
        let report = svc
            .pipeline(&ctx(&["reports.view"]), to - Duration::days(30), to)
            .await
            .unwrap();

        assert_eq!(report.stages.len(), 4);
        assert_eq!(report.stages[0].count, 0);
        assert_eq!(report.open_value, 1_000);
        assert_eq!(report.weighted_value, 500);
        assert_eq!(report.won_value, 700);
        assert_eq!(report.lost_count, 3);
    }

    #[tokio::test]
    async fn test_lead_conversion() {
        let mut repo = MockReportRepository::new();
        repo.expect_lead_status_counts().returning(|_, _, _| {
            Ok(vec![
                StatusCount { status: LeadStatus::New, count: 5 },
                StatusCount { status: LeadStatus::Converted, count: 3 },
            ])
        });

        let svc = ReportService::new(Arc::new(repo));
        let to = Utc::now();
        let report = svc
            .lead_conversion(&ctx(&["reports.*"]), to - Duration::days(7), to)
            .await
            .unwrap();
        assert_eq!(report.total, 8);
        assert_eq!(report.converted, 3);
        assert_eq!(report.conversion_rate, 37.5);
        assert_eq!(report.by_status.len(), LeadStatus::ALL.len());
    }

    #[tokio::test]
    async fn test_reports_need_permission() {
        let svc = ReportService::new(Arc::new(MockReportRepository::new()));
        assert!(matches!(
            svc.invoice_aging(&ctx(&["crm.*"]), date(2024, 1, 1)).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_attendance_summary_range_checked() {
        let svc = ReportService::new(Arc::new(MockReportRepository::new()));
        let err = svc
            .attendance_summary(&ctx(&["reports.view"]), date(2024, 2, 1), date(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }
}
