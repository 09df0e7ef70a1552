//! Audit log repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::AuditLog;
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub auditable_type: Option<String>,
    pub auditable_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn create(&self, log: &AuditLog) -> Result<(), DomainError>;
    /// Newest first.
    async fn list(&self, scope: &TenantScope, filter: AuditLogFilter, pagination: Pagination) -> Result<Page<AuditLog>, DomainError>;
}
