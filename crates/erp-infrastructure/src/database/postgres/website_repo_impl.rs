// ============================================================================
// ERP Infrastructure - PostgreSQL Website Repository
// File: crates/erp-infrastructure/src/database/postgres/website_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use erp_core::domain::{WebsitePage, WebsiteSite};
use erp_core::error::DomainError;
use erp_core::repositories::WebsiteRepository;
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, is_unique_violation};

pub struct PgWebsiteRepository {
    pool: PgPool,
}

impl PgWebsiteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SiteRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    domain: String,
    theme: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<SiteRow> for WebsiteSite {
    fn from(row: SiteRow) -> Self {
        WebsiteSite {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            domain: row.domain,
            theme: row.theme,
            is_published: row.is_published,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct PageRow {
    id: Uuid,
    tenant_id: Uuid,
    site_id: Uuid,
    title: String,
    slug: String,
    content: String,
    meta_title: Option<String>,
    meta_description: Option<String>,
    sort_order: i32,
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<PageRow> for WebsitePage {
    fn from(row: PageRow) -> Self {
        WebsitePage {
            id: row.id,
            tenant_id: row.tenant_id,
            site_id: row.site_id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            sort_order: row.sort_order,
            is_published: row.is_published,
            published_at: row.published_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const SITE_COLUMNS: &str = "id, tenant_id, name, domain, theme, is_published, \
    created_at, created_by, modified_at, modified_by";

const PAGE_COLUMNS: &str = "id, tenant_id, site_id, title, slug, content, meta_title, meta_description, \
    sort_order, is_published, published_at, created_at, created_by, modified_at, modified_by";

fn domain_taken(site: &WebsiteSite) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Website",
        field: "domain",
        value: site.domain.clone(),
    }
}

fn slug_taken(page: &WebsitePage) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Page",
        field: "slug",
        value: page.slug.clone(),
    }
}

#[async_trait]
impl WebsiteRepository for PgWebsiteRepository {
    async fn find_site(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebsiteSite>, DomainError> {
        let row: Option<SiteRow> = sqlx::query_as(&format!(
            "SELECT {} FROM website_sites WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            SITE_COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find website"))?;

        Ok(row.map(WebsiteSite::from))
    }

    async fn find_site_by_domain(&self, domain: &str) -> Result<Option<WebsiteSite>, DomainError> {
        let row: Option<SiteRow> = sqlx::query_as(&format!(
            "SELECT {} FROM website_sites WHERE domain = LOWER($1)",
            SITE_COLUMNS
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find website by domain"))?;

        Ok(row.map(WebsiteSite::from))
    }

    async fn list_sites(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<WebsiteSite>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM website_sites WHERE ($1::uuid IS NULL OR tenant_id = $1)")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count websites"))?;

        let rows: Vec<SiteRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM website_sites
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
            SITE_COLUMNS
        ))
        .bind(scope.tenant_id())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list websites"))?;

        Ok(Page::new(rows.into_iter().map(WebsiteSite::from).collect(), total, pagination))
    }

    async fn create_site(&self, site: &WebsiteSite) -> Result<WebsiteSite, DomainError> {
        let row: SiteRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO website_sites (id, tenant_id, name, domain, theme, is_published, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SITE_COLUMNS
        ))
        .bind(site.id)
        .bind(site.tenant_id)
        .bind(&site.name)
        .bind(&site.domain)
        .bind(&site.theme)
        .bind(site.is_published)
        .bind(site.created_at)
        .bind(site.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return domain_taken(site);
            }
            error!("Database error creating website: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn update_site(&self, site: &WebsiteSite) -> Result<WebsiteSite, DomainError> {
        let row: Option<SiteRow> = sqlx::query_as(&format!(
            r#"
            UPDATE website_sites SET
                name = $2, domain = $3, theme = $4, is_published = $5,
                modified_at = $6, modified_by = $7
            WHERE id = $1
            RETURNING {}
            "#,
            SITE_COLUMNS
        ))
        .bind(site.id)
        .bind(&site.name)
        .bind(&site.domain)
        .bind(&site.theme)
        .bind(site.is_published)
        .bind(site.modified_at)
        .bind(site.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return domain_taken(site);
            }
            error!("Database error updating website: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(WebsiteSite::from).ok_or_else(|| DomainError::not_found("Website", site.id))
    }

    async fn delete_site(&self, id: &Uuid) -> Result<(), DomainError> {
        // Pages go with the site through ON DELETE CASCADE.
        sqlx::query("DELETE FROM website_sites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete website"))?;
        Ok(())
    }

    async fn find_page(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebsitePage>, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM website_pages WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            PAGE_COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find page"))?;

        Ok(row.map(WebsitePage::from))
    }

    async fn find_page_by_slug(&self, site_id: &Uuid, slug: &str) -> Result<Option<WebsitePage>, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM website_pages WHERE site_id = $1 AND slug = $2",
            PAGE_COLUMNS
        ))
        .bind(site_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find page by slug"))?;

        Ok(row.map(WebsitePage::from))
    }

    async fn list_pages(&self, site_id: &Uuid, pagination: Pagination) -> Result<Page<WebsitePage>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM website_pages WHERE site_id = $1")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count pages"))?;

        let rows: Vec<PageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM website_pages WHERE site_id = $1 ORDER BY sort_order ASC, title ASC LIMIT $2 OFFSET $3",
            PAGE_COLUMNS
        ))
        .bind(site_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list pages"))?;

        Ok(Page::new(rows.into_iter().map(WebsitePage::from).collect(), total, pagination))
    }

    async fn create_page(&self, page: &WebsitePage) -> Result<WebsitePage, DomainError> {
        let row: PageRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO website_pages ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            PAGE_COLUMNS, PAGE_COLUMNS
        ))
        .bind(page.id)
        .bind(page.tenant_id)
        .bind(page.site_id)
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.content)
        .bind(&page.meta_title)
        .bind(&page.meta_description)
        .bind(page.sort_order)
        .bind(page.is_published)
        .bind(page.published_at)
        .bind(page.created_at)
        .bind(page.created_by)
        .bind(page.modified_at)
        .bind(page.modified_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return slug_taken(page);
            }
            error!("Database error creating page: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn update_page(&self, page: &WebsitePage) -> Result<WebsitePage, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(&format!(
            r#"
            UPDATE website_pages SET
                title = $2, slug = $3, content = $4, meta_title = $5, meta_description = $6,
                sort_order = $7, is_published = $8, published_at = $9,
                modified_at = $10, modified_by = $11
            WHERE id = $1
            RETURNING {}
            "#,
            PAGE_COLUMNS
        ))
        .bind(page.id)
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.content)
        .bind(&page.meta_title)
        .bind(&page.meta_description)
        .bind(page.sort_order)
        .bind(page.is_published)
        .bind(page.published_at)
        .bind(page.modified_at)
        .bind(page.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return slug_taken(page);
            }
            error!("Database error updating page: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(WebsitePage::from).ok_or_else(|| DomainError::not_found("Page", page.id))
    }

    async fn delete_page(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM website_pages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete page"))?;
        Ok(())
    }

    async fn find_published_page(&self, domain: &str, slug: &str) -> Result<Option<WebsitePage>, DomainError> {
        let row: Option<PageRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.tenant_id, p.site_id, p.title, p.slug, p.content, p.meta_title,
                   p.meta_description, p.sort_order, p.is_published, p.published_at,
                   p.created_at, p.created_by, p.modified_at, p.modified_by
            FROM website_pages p
            JOIN website_sites s ON s.id = p.site_id
            JOIN tenants t ON t.id = s.tenant_id
            WHERE s.domain = LOWER($1) AND p.slug = $2
              AND p.is_published AND s.is_published
              AND t.is_active AND t.removed_at IS NULL
            "#,
        )
        .bind(domain)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find published page"))?;

        Ok(row.map(WebsitePage::from))
    }
}
