//! Webhook repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::{WebhookDelivery, WebhookEndpoint};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebhookEndpoint>, DomainError>;
    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<WebhookEndpoint>, DomainError>;
    async fn list_active_for_tenant(&self, tenant_id: &Uuid) -> Result<Vec<WebhookEndpoint>, DomainError>;
    async fn create(&self, endpoint: &WebhookEndpoint) -> Result<WebhookEndpoint, DomainError>;
    async fn update(&self, endpoint: &WebhookEndpoint) -> Result<WebhookEndpoint, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;

    async fn record_delivery(&self, delivery: &WebhookDelivery) -> Result<(), DomainError>;
    /// Newest first.
    async fn list_deliveries(&self, endpoint_id: &Uuid, pagination: Pagination) -> Result<Page<WebhookDelivery>, DomainError>;
}
