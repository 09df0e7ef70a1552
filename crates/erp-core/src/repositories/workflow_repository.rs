//! Workflow repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::Workflow;
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Workflow>, DomainError>;
    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<Workflow>, DomainError>;
    async fn list_active_for_trigger(&self, tenant_id: &Uuid, trigger: &str) -> Result<Vec<Workflow>, DomainError>;
    async fn create(&self, workflow: &Workflow) -> Result<Workflow, DomainError>;
    async fn update(&self, workflow: &Workflow) -> Result<Workflow, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
    /// Increments `run_count` and stamps `last_run_at`.
    async fn record_run(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), DomainError>;
}
