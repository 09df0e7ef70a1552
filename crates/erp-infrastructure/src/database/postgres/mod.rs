//! PostgreSQL repository implementations

mod attendance_repo_impl;
mod audit_log_repo_impl;
mod crm_repo_impl;
mod employee_repo_impl;
mod integration_repo_impl;
mod invoice_repo_impl;
mod notification_repo_impl;
mod product_repo_impl;
mod report_repo_impl;
mod role_repo_impl;
mod tenant_repo_impl;
mod user_repo_impl;
mod webhook_repo_impl;
mod website_repo_impl;
mod workflow_repo_impl;

pub use attendance_repo_impl::PgAttendanceRepository;
pub use audit_log_repo_impl::PgAuditLogRepository;
pub use crm_repo_impl::{PgDealRepository, PgLeadRepository};
pub use employee_repo_impl::PgEmployeeRepository;
pub use integration_repo_impl::PgAttendanceIntegrationRepository;
pub use invoice_repo_impl::PgInvoiceRepository;
pub use notification_repo_impl::PgNotificationRepository;
pub use product_repo_impl::PgProductRepository;
pub use report_repo_impl::PgReportRepository;
pub use role_repo_impl::PgRoleRepository;
pub use tenant_repo_impl::PgTenantRepository;
pub use user_repo_impl::PgUserRepository;
pub use webhook_repo_impl::PgWebhookRepository;
pub use website_repo_impl::PgWebsiteRepository;
pub use workflow_repo_impl::PgWorkflowRepository;

use erp_core::DomainError;
use tracing::error;

/// Log and wrap a sqlx error.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e: sqlx::Error| {
        error!("Database error ({}): {}", context, e);
        DomainError::DatabaseError(e.to_string())
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e.as_database_error() {
        Some(db) => {
            let msg = db.message().to_lowercase();
            db.is_unique_violation() || msg.contains("unique") || msg.contains("duplicate")
        }
        None => false,
    }
}

/// Turn a free-text search into an ILIKE pattern; blank searches disable the filter.
pub(crate) fn like_pattern(search: Option<String>) -> Option<String> {
    search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" acme ".into())), Some("%acme%".into()));
        assert_eq!(like_pattern(Some("50%_off".into())), Some("%50\\%\\_off%".into()));
        assert_eq!(like_pattern(Some("   ".into())), None);
        assert_eq!(like_pattern(None), None);
    }
}
