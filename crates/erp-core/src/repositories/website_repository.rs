//! Website repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::{WebsitePage, WebsiteSite};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait WebsiteRepository: Send + Sync {
    async fn find_site(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebsiteSite>, DomainError>;
    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<WebsiteSite>, DomainError>;
    async fn list_sites(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<WebsiteSite>, DomainError>;
    async fn create_site(&self, site: &WebsiteSite) -> Result<WebsiteSite, DomainError>;
    async fn update_site(&self, site: &WebsiteSite) -> Result<WebsiteSite, DomainError>;
    /// Deletes the site and its pages.
    async fn delete_site(&self, id: &Uuid) -> Result<(), DomainError>;

    async fn find_page(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebsitePage>, DomainError>;
    async fn find_page_by_slug(&self, site_id: &Uuid, slug: &str) -> Result<Option<WebsitePage>, DomainError>;
    async fn list_pages(&self, site_id: &Uuid, pagination: Pagination) -> Result<Page<WebsitePage>, DomainError>;
    async fn create_page(&self, page: &WebsitePage) -> Result<WebsitePage, DomainError>;
    async fn update_page(&self, page: &WebsitePage) -> Result<WebsitePage, DomainError>;
    async fn delete_page(&self, id: &Uuid) -> Result<(), DomainError>;

    /// Published page of a published site whose tenant is active.
    async fn find_published_page(&self, domain: &str, slug: &str) -> Result<Option<WebsitePage>, DomainError>;
}
