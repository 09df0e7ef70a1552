//! Repository traits (ports)
//!
//! Every tenant-owned lookup takes a [`TenantScope`](crate::TenantScope); a row
//! outside the scope behaves exactly like a missing row.

pub mod attendance_repository;
pub mod audit_log_repository;
pub mod crm_repository;
pub mod notification_repository;
pub mod report_repository;
pub mod role_repository;
pub mod sales_repository;
pub mod tenant_repository;
pub mod user_repository;
pub mod webhook_repository;
pub mod website_repository;
pub mod workflow_repository;

pub use attendance_repository::{
    AttendanceFilter, AttendanceIntegrationRepository, AttendanceRepository, EmployeeFilter,
    EmployeeRepository, PunchFilter,
};
pub use audit_log_repository::{AuditLogFilter, AuditLogRepository};
pub use crm_repository::{DealFilter, DealRepository, LeadFilter, LeadRepository};
pub use notification_repository::NotificationRepository;
pub use report_repository::{AttendanceSummaryRow, OutstandingInvoice, ReportRepository, StageTotal, StatusCount};
pub use role_repository::RoleRepository;
pub use sales_repository::{InvoiceFilter, InvoiceRepository, ProductFilter, ProductRepository};
pub use tenant_repository::TenantRepository;
pub use user_repository::{UserFilter, UserRepository};
pub use webhook_repository::WebhookRepository;
pub use website_repository::WebsiteRepository;
pub use workflow_repository::WorkflowRepository;

#[cfg(any(test, feature = "mocks"))]
pub use attendance_repository::{MockAttendanceIntegrationRepository, MockAttendanceRepository, MockEmployeeRepository};
#[cfg(any(test, feature = "mocks"))]
pub use audit_log_repository::MockAuditLogRepository;
#[cfg(any(test, feature = "mocks"))]
pub use crm_repository::{MockDealRepository, MockLeadRepository};
#[cfg(any(test, feature = "mocks"))]
pub use notification_repository::MockNotificationRepository;
#[cfg(any(test, feature = "mocks"))]
pub use report_repository::MockReportRepository;
#[cfg(any(test, feature = "mocks"))]
pub use role_repository::MockRoleRepository;
#[cfg(any(test, feature = "mocks"))]
pub use sales_repository::{MockInvoiceRepository, MockProductRepository};
#[cfg(any(test, feature = "mocks"))]
pub use tenant_repository::MockTenantRepository;
#[cfg(any(test, feature = "mocks"))]
pub use user_repository::MockUserRepository;
#[cfg(any(test, feature = "mocks"))]
pub use webhook_repository::MockWebhookRepository;
#[cfg(any(test, feature = "mocks"))]
pub use website_repository::MockWebsiteRepository;
#[cfg(any(test, feature = "mocks"))]
pub use workflow_repository::MockWorkflowRepository;
