//! Employee, attendance and integration repository traits (ports)

use async_trait::async_trait;
use chrono::NaiveDate;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::{Attendance, AttendanceIntegration, AttendancePunch, Employee};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub employee_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct PunchFilter {
    pub employee_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Employee>, DomainError>;
    async fn find_by_code(&self, tenant_id: &Uuid, code: &str) -> Result<Option<Employee>, DomainError>;
    async fn find_by_codes(&self, tenant_id: &Uuid, codes: &[String]) -> Result<Vec<Employee>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: EmployeeFilter, pagination: Pagination) -> Result<Page<Employee>, DomainError>;
    async fn create(&self, employee: &Employee) -> Result<Employee, DomainError>;
    async fn update(&self, employee: &Employee) -> Result<Employee, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Inserts or refreshes a punch keyed by `(tenant_id, external_id)`.
    /// Returns `true` when the punch was new.
    async fn upsert_punch(&self, punch: &AttendancePunch) -> Result<bool, DomainError>;
    async fn punches_for_day(&self, tenant_id: &Uuid, employee_id: &Uuid, work_date: NaiveDate) -> Result<Vec<AttendancePunch>, DomainError>;
    async fn list_punches(&self, scope: &TenantScope, filter: PunchFilter, pagination: Pagination) -> Result<Page<AttendancePunch>, DomainError>;

    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Attendance>, DomainError>;
    async fn find_for_day(&self, tenant_id: &Uuid, employee_id: &Uuid, work_date: NaiveDate) -> Result<Option<Attendance>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: AttendanceFilter, pagination: Pagination) -> Result<Page<Attendance>, DomainError>;
    /// Upsert keyed by `(tenant_id, employee_id, work_date)`.
    async fn save(&self, attendance: &Attendance) -> Result<Attendance, DomainError>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait AttendanceIntegrationRepository: Send + Sync {
    async fn find_by_tenant(&self, tenant_id: &Uuid) -> Result<Option<AttendanceIntegration>, DomainError>;
    /// Enabled integrations of active tenants.
    async fn list_enabled(&self) -> Result<Vec<AttendanceIntegration>, DomainError>;
    /// Upsert keyed by tenant.
    async fn save(&self, integration: &AttendanceIntegration) -> Result<AttendanceIntegration, DomainError>;
}
