//! Lead and deal repository traits (ports)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::{Deal, DealStage, Lead, LeadStatus};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub owner_id: Option<Uuid>,
    /// Matches name, email or company.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub stage: Option<DealStage>,
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Lead>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: LeadFilter, pagination: Pagination) -> Result<Page<Lead>, DomainError>;
    async fn create(&self, lead: &Lead) -> Result<Lead, DomainError>;
    async fn update(&self, lead: &Lead) -> Result<Lead, DomainError>;
    /// Inserts the deal and marks the lead converted in one transaction. `Conflict`
    /// when the stored lead is already converted or unqualified.
    async fn convert(&self, lead: &Lead, deal: &Deal) -> Result<(Lead, Deal), DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Deal>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: DealFilter, pagination: Pagination) -> Result<Page<Deal>, DomainError>;
    async fn create(&self, deal: &Deal) -> Result<Deal, DomainError>;
    async fn update(&self, deal: &Deal) -> Result<Deal, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
}
