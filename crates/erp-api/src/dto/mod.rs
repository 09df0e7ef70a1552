//! Request DTOs that are not service inputs: query strings and small action bodies.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use erp_core::repositories::{
    AttendanceFilter, AuditLogFilter, DealFilter, EmployeeFilter, InvoiceFilter, LeadFilter, ProductFilter,
    PunchFilter, UserFilter,
};
use erp_core::{DealStage, InvoiceStatus, LeadStatus};
use erp_shared::Pagination;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl SearchQuery {
    pub fn pagination(&self) -> Pagination {
        PageQuery { page: self.page, per_page: self.per_page }.pagination()
    }

    pub fn user_filter(&self) -> UserFilter {
        UserFilter { search: self.search.clone(), is_active: self.is_active }
    }

    pub fn product_filter(&self) -> ProductFilter {
        ProductFilter { search: self.search.clone(), is_active: self.is_active }
    }

    pub fn employee_filter(&self) -> EmployeeFilter {
        EmployeeFilter { search: self.search.clone(), is_active: self.is_active }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<LeadStatus>,
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
}

impl LeadQuery {
    pub fn split(self) -> (LeadFilter, Pagination) {
        let pagination = PageQuery { page: self.page, per_page: self.per_page }.pagination();
        let filter = LeadFilter { status: self.status, owner_id: self.owner_id, search: self.search };
        (filter, pagination)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DealQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub stage: Option<DealStage>,
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
}

impl DealQuery {
    pub fn split(self) -> (DealFilter, Pagination) {
        let pagination = PageQuery { page: self.page, per_page: self.per_page }.pagination();
        let filter = DealFilter { stage: self.stage, owner_id: self.owner_id, search: self.search };
        (filter, pagination)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<InvoiceStatus>,
    pub search: Option<String>,
}

impl InvoiceQuery {
    pub fn split(self) -> (InvoiceFilter, Pagination) {
        let pagination = PageQuery { page: self.page, per_page: self.per_page }.pagination();
        (InvoiceFilter { status: self.status, search: self.search }, pagination)
    }
}

/// Shared by attendance records and raw punches.
#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AttendanceQuery {
    pub fn pagination(&self) -> Pagination {
        PageQuery { page: self.page, per_page: self.per_page }.pagination()
    }

    pub fn attendance_filter(&self) -> AttendanceFilter {
        AttendanceFilter { employee_id: self.employee_id, from: self.from, to: self.to }
    }

    pub fn punch_filter(&self) -> PunchFilter {
        PunchFilter { employee_id: self.employee_id, from: self.from, to: self.to }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub auditable_type: Option<String>,
    pub auditable_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
}

impl AuditQuery {
    pub fn split(self) -> (AuditLogFilter, Pagination) {
        let pagination = PageQuery { page: self.page, per_page: self.per_page }.pagination();
        let filter = AuditLogFilter {
            auditable_type: self.auditable_type,
            auditable_id: self.auditable_id,
            user_id: self.user_id,
            action: self.action,
        };
        (filter, pagination)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub unread: bool,
}

/// Inclusive date range; defaults to the last 30 days ending today.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const DEFAULT_REPORT_DAYS: i64 = 30;

impl DateRangeQuery {
    pub fn dates(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS - 1));
        if from > to {
            return Err(ApiError::BadRequest("from must not be after to".into()));
        }
        Ok((from, to))
    }

    /// Half-open `[from 00:00, to + 1 day 00:00)` in UTC.
    pub fn instants(&self, today: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let (from, to) = self.dates(today)?;
        let start = from.and_time(NaiveTime::MIN).and_utc();
        let end = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
        Ok((start, end))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgingQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeadStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignLeadRequest {
    pub owner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_page_query_clamps() {
        let p = PageQuery { page: Some(0), per_page: Some(1000) }.pagination();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);

        let p = PageQuery::default().pagination();
        assert_eq!((p.page, p.per_page), (1, 20));
    }

    #[test]
    fn test_date_range_defaults_to_last_thirty_days() {
        let (from, to) = DateRangeQuery::default().dates(date(2024, 3, 31)).unwrap();
        assert_eq!(from, date(2024, 3, 2));
        assert_eq!(to, date(2024, 3, 31));
    }

    #[test]
    fn test_date_range_instants_are_half_open() {
        let q = DateRangeQuery { from: Some(date(2024, 1, 1)), to: Some(date(2024, 1, 31)) };
        let (start, end) = q.instants(date(2024, 6, 1)).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let q = DateRangeQuery { from: Some(date(2024, 2, 1)), to: Some(date(2024, 1, 1)) };
        assert!(q.dates(date(2024, 6, 1)).is_err());
    }
}
