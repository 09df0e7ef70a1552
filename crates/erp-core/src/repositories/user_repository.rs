//! User repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::User;
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Matches name or email, case-insensitive.
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<User>, DomainError>;
    /// Emails are unique across tenants.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: UserFilter, pagination: Pagination) -> Result<Page<User>, DomainError>;
    /// Counts users that are not soft-deleted.
    async fn count_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError>;
    async fn create(&self, user: &User) -> Result<User, DomainError>;
    async fn update(&self, user: &User) -> Result<User, DomainError>;
    async fn role_ids(&self, user_id: &Uuid) -> Result<Vec<Uuid>, DomainError>;
    /// Replaces the user's role assignments.
    async fn set_roles(&self, user_id: &Uuid, role_ids: &[Uuid]) -> Result<(), DomainError>;
    /// Union of the raw grants of all roles of the user.
    async fn permissions_for(&self, user_id: &Uuid) -> Result<Vec<String>, DomainError>;
}
