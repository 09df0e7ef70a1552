//! Application services
//!
//! Each service authorizes the caller, applies tenant scoping, persists
//! through the repository ports and dispatches a domain event on success.

pub mod attendance_service;
pub mod attendance_sync_service;
pub mod audit_service;
pub mod auth_service;
pub mod deal_service;
pub mod employee_service;
pub mod invoice_service;
pub mod lead_service;
pub mod notification_service;
pub mod product_service;
pub mod report_service;
pub mod role_service;
pub mod tenant_service;
pub mod user_service;
pub mod webhook_service;
pub mod website_service;
pub mod workflow_service;

pub use attendance_service::AttendanceService;
pub use attendance_sync_service::{AttendanceProvider, AttendanceSyncService, SyncReport};
pub use audit_service::AuditService;
pub use auth_service::{AuthService, LoginResult, MeResult};
pub use deal_service::DealService;
pub use employee_service::EmployeeService;
pub use invoice_service::InvoiceService;
pub use lead_service::{ConversionResult, LeadService};
pub use notification_service::NotificationService;
pub use product_service::ProductService;
pub use report_service::ReportService;
pub use role_service::RoleService;
pub use tenant_service::TenantService;
pub use user_service::UserService;
pub use webhook_service::{CreatedWebhook, WebhookService};
pub use website_service::WebsiteService;
pub use workflow_service::WorkflowService;

#[cfg(any(test, feature = "mocks"))]
pub use attendance_sync_service::MockAttendanceProvider;

use uuid::Uuid;

use crate::error::DomainError;

/// Turns a scoped lookup miss into `NotFound`.
pub(crate) fn found<T>(value: Option<T>, entity: &'static str, id: &Uuid) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::not_found(entity, id))
}

/// Blank strings in optional inputs count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
