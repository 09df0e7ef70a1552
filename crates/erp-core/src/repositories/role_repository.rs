//! Role repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Role>, DomainError>;
    async fn find_by_name(&self, tenant_id: &Uuid, name: &str) -> Result<Option<Role>, DomainError>;
    /// Roles of `tenant_id` among `ids`; foreign ids are silently absent.
    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Role>, DomainError>;
    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<Role>, DomainError>;
    async fn create(&self, role: &Role) -> Result<Role, DomainError>;
    async fn update(&self, role: &Role) -> Result<Role, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
    async fn count_users(&self, role_id: &Uuid) -> Result<i64, DomainError>;
}
