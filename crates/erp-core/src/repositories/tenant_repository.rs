//! Tenant repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::Tenant;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Soft-deleted tenants are not returned.
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError>;
    async fn list(&self, search: Option<String>, pagination: Pagination) -> Result<Page<Tenant>, DomainError>;
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
}
