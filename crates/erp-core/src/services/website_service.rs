//! Website sites, pages and the public page lookup

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{WebsitePage, WebsiteSite};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::WebsiteRepository;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSiteInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 3, max = 253))]
    pub domain: String,
    #[validate(length(max = 100))]
    pub theme: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSiteInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 253))]
    pub domain: Option<String>,
    #[validate(length(max = 100))]
    pub theme: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePageInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[validate(length(max = 200))]
    pub meta_title: Option<String>,
    #[validate(length(max = 500))]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePageInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    pub content: Option<String>,
    #[validate(length(max = 200))]
    pub meta_title: Option<String>,
    #[validate(length(max = 500))]
    pub meta_description: Option<String>,
    pub sort_order: Option<i32>,
}

pub struct WebsiteService {
    websites: Arc<dyn WebsiteRepository>,
    events: EventDispatcher,
}

impl WebsiteService {
    pub fn new(websites: Arc<dyn WebsiteRepository>, events: EventDispatcher) -> Self {
        Self { websites, events }
    }

    // Sites

    pub async fn list_sites(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Page<WebsiteSite>, DomainError> {
        ResourcePolicy::SITES.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.websites.list_sites(&ctx.scope, pagination).await
    }

    pub async fn get_site(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebsiteSite, DomainError> {
        self.load_site(ctx, id, Ability::View).await
    }

    pub async fn create_site(&self, ctx: &RequestContext, input: CreateSiteInput) -> Result<WebsiteSite, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::SITES.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let mut site = WebsiteSite::new(tenant_id, input.name, input.domain, ctx.actor_id())?;
        site.theme = non_blank(input.theme);
        site.is_published = input.is_published;
        self.ensure_domain_free(&site).await?;

        let site = self.websites.create_site(&site).await?;
        info!(tenant_id = %tenant_id, domain = %site.domain, "Website created");
        self.events
            .dispatch(self.site_event(ctx, EventName::SiteCreated, &site).with_new(&site))
            .await;
        Ok(site)
    }

    pub async fn update_site(&self, ctx: &RequestContext, id: &Uuid, input: UpdateSiteInput) -> Result<WebsiteSite, DomainError> {
        input.validate()?;
        let mut site = self.load_site(ctx, id, Ability::Update).await?;
        let before = site.clone();

        if let Some(name) = non_blank(input.name) {
            site.name = name;
        }
        if let Some(domain) = non_blank(input.domain) {
            site.domain = WebsiteSite::normalize_domain(&domain);
        }
        if input.theme.is_some() {
            site.theme = non_blank(input.theme);
        }
        if let Some(published) = input.is_published {
            site.is_published = published;
        }
        if site.domain != before.domain {
            self.ensure_domain_free(&site).await?;
        }
        site.touch(ctx.actor_id());
        site.validate()?;

        let site = self.websites.update_site(&site).await?;
        self.events
            .dispatch(self.site_event(ctx, EventName::SiteUpdated, &site).with_old(&before).with_new(&site))
            .await;
        Ok(site)
    }

    pub async fn delete_site(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let site = self.load_site(ctx, id, Ability::Delete).await?;
        self.websites.delete_site(&site.id).await?;
        info!(domain = %site.domain, "Website deleted");
        self.events
            .dispatch(self.site_event(ctx, EventName::SiteDeleted, &site).with_old(&site))
            .await;
        Ok(())
    }

    // Pages

    pub async fn list_pages(&self, ctx: &RequestContext, site_id: &Uuid, pagination: Pagination) -> Result<Page<WebsitePage>, DomainError> {
        let site = self.load_site(ctx, site_id, Ability::View).await?;
        ResourcePolicy::PAGES.authorize(&ctx.actor, Ability::View, Some(site.tenant_id))?;
        self.websites.list_pages(&site.id, pagination).await
    }

    pub async fn get_page(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebsitePage, DomainError> {
        self.load_page(ctx, id, Ability::View).await
    }

    pub async fn create_page(&self, ctx: &RequestContext, site_id: &Uuid, input: CreatePageInput) -> Result<WebsitePage, DomainError> {
        input.validate()?;
        let site = found(self.websites.find_site(&ctx.scope, site_id).await?, "WebsiteSite", site_id)?;
        ResourcePolicy::PAGES.authorize(&ctx.actor, Ability::Create, Some(site.tenant_id))?;

        let mut page = WebsitePage::new(
            site.tenant_id,
            site.id,
            input.title,
            input.slug,
            input.content,
            ctx.actor_id(),
        )?;
        page.meta_title = non_blank(input.meta_title);
        page.meta_description = non_blank(input.meta_description);
        page.sort_order = input.sort_order;
        self.ensure_slug_free(&page).await?;

        let page = self.websites.create_page(&page).await?;
        info!(site_id = %site.id, slug = %page.slug, "Page created");
        self.events
            .dispatch(self.page_event(ctx, EventName::PageCreated, &page).with_new(&page))
            .await;
        Ok(page)
    }

    pub async fn update_page(&self, ctx: &RequestContext, id: &Uuid, input: UpdatePageInput) -> Result<WebsitePage, DomainError> {
        input.validate()?;
        let mut page = self.load_page(ctx, id, Ability::Update).await?;
        let before = page.clone();

        if let Some(title) = non_blank(input.title) {
            page.title = title;
        }
        if let Some(slug) = non_blank(input.slug) {
            page.slug = WebsitePage::resolve_slug(&page.title, Some(&slug))?;
        }
        if let Some(content) = input.content {
            page.content = content;
        }
        if input.meta_title.is_some() {
            page.meta_title = non_blank(input.meta_title);
        }
        if input.meta_description.is_some() {
            page.meta_description = non_blank(input.meta_description);
        }
        if let Some(order) = input.sort_order {
            page.sort_order = order;
        }
        if page.slug != before.slug {
            self.ensure_slug_free(&page).await?;
        }
        page.touch(ctx.actor_id());
        page.validate()?;

        let page = self.websites.update_page(&page).await?;
        self.events
            .dispatch(self.page_event(ctx, EventName::PageUpdated, &page).with_old(&before).with_new(&page))
            .await;
        Ok(page)
    }

    pub async fn delete_page(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let page = self.load_page(ctx, id, Ability::Delete).await?;
        self.websites.delete_page(&page.id).await?;
        self.events
            .dispatch(self.page_event(ctx, EventName::PageDeleted, &page).with_old(&page))
            .await;
        Ok(())
    }

    pub async fn publish_page(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebsitePage, DomainError> {
        self.set_published(ctx, id, true).await
    }

    pub async fn unpublish_page(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebsitePage, DomainError> {
        self.set_published(ctx, id, false).await
    }

    /// Unauthenticated lookup for the public site renderer.
    pub async fn public_page(&self, domain: &str, slug: &str) -> Result<WebsitePage, DomainError> {
        let domain = WebsiteSite::normalize_domain(domain);
        let slug = slug.trim().to_lowercase();
        self.websites
            .find_published_page(&domain, &slug)
            .await?
            .ok_or_else(|| DomainError::not_found("WebsitePage", format!("{}/{}", domain, slug)))
    }

    async fn set_published(&self, ctx: &RequestContext, id: &Uuid, published: bool) -> Result<WebsitePage, DomainError> {
        let mut page = self.load_page(ctx, id, Ability::Publish).await?;
        if page.is_published == published {
            return Ok(page);
        }
        let before = page.clone();
        if published {
            page.publish();
        } else {
            page.unpublish();
        }
        page.touch(ctx.actor_id());

        let page = self.websites.update_page(&page).await?;
        let name = if published {
            EventName::PagePublished
        } else {
            EventName::PageUnpublished
        };
        info!(page_id = %page.id, published, "Page publication changed");
        self.events
            .dispatch(self.page_event(ctx, name, &page).with_old(&before).with_new(&page))
            .await;
        Ok(page)
    }

    async fn ensure_domain_free(&self, site: &WebsiteSite) -> Result<(), DomainError> {
        match self.websites.find_site_by_domain(&site.domain).await? {
            Some(existing) if existing.id != site.id => {
                Err(DomainError::already_exists("WebsiteSite", "domain", site.domain.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_slug_free(&self, page: &WebsitePage) -> Result<(), DomainError> {
        match self.websites.find_page_by_slug(&page.site_id, &page.slug).await? {
            Some(existing) if existing.id != page.id => {
                Err(DomainError::already_exists("WebsitePage", "slug", page.slug.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn load_site(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<WebsiteSite, DomainError> {
        let site = found(self.websites.find_site(&ctx.scope, id).await?, "WebsiteSite", id)?;
        ResourcePolicy::SITES.authorize(&ctx.actor, ability, Some(site.tenant_id))?;
        Ok(site)
    }

    async fn load_page(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<WebsitePage, DomainError> {
        let page = found(self.websites.find_page(&ctx.scope, id).await?, "WebsitePage", id)?;
        ResourcePolicy::PAGES.authorize(&ctx.actor, ability, Some(page.tenant_id))?;
        Ok(page)
    }

    fn site_event(&self, ctx: &RequestContext, name: EventName, site: &WebsiteSite) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(site.tenant_id), "WebsiteSite", site.id)
    }

    fn page_event(&self, ctx: &RequestContext, name: EventName, page: &WebsitePage) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(page.tenant_id), "WebsitePage", page.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::MockWebsiteRepository;
    use crate::tenancy::TenantScope;

    fn editor(tenant_id: Uuid, grants: &[&str]) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, grants.iter().map(|g| g.to_string()).collect()),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    #[tokio::test]
    async fn test_domain_is_globally_unique() {
        let tenant = Uuid::new_v4();
        let mut repo = MockWebsiteRepository::new();
        repo.expect_find_site_by_domain()
            .withf(|d| d == "shop.example.com")
            .returning(|d| Ok(Some(WebsiteSite::new(Uuid::new_v4(), "Other".into(), d.into(), None).unwrap())));
        repo.expect_create_site().never();

        let svc = WebsiteService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc
            .create_site(
                &editor(tenant, &["website.*"]),
                CreateSiteInput {
                    name: "Shop".into(),
                    domain: "Shop.Example.com".into(),
                    theme: None,
                    is_published: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { field: "domain", .. }));
    }

    #[tokio::test]
    async fn test_page_slug_derived_and_checked() {
        let tenant = Uuid::new_v4();
        let site = WebsiteSite::new(tenant, "Shop".into(), "shop.example.com".into(), None).unwrap();
        let site_id = site.id;
        let mut repo = MockWebsiteRepository::new();
        repo.expect_find_site().returning(move |_, _| Ok(Some(site.clone())));
        repo.expect_find_page_by_slug()
            .withf(move |s, slug| *s == site_id && slug == "about-us")
            .returning(|_, _| Ok(None));
        repo.expect_create_page().returning(|p| Ok(p.clone()));

        let svc = WebsiteService::new(Arc::new(repo), EventDispatcher::default());
        let page = svc
            .create_page(
                &editor(tenant, &["website.pages.create"]),
                &site_id,
                CreatePageInput {
                    title: "About Us".into(),
                    slug: None,
                    content: "<p>Hi</p>".into(),
                    meta_title: None,
                    meta_description: None,
                    sort_order: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.slug, "about-us");
        assert!(!page.is_published);
    }

    #[tokio::test]
    async fn test_publish_requires_publish_permission() {
        let tenant = Uuid::new_v4();
        let page = WebsitePage::new(tenant, Uuid::new_v4(), "Home".into(), None, String::new(), None).unwrap();
        let mut repo = MockWebsiteRepository::new();
        repo.expect_find_page().returning(move |_, _| Ok(Some(page.clone())));
        repo.expect_update_page().never();

        let svc = WebsiteService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc
            .publish_page(&editor(tenant, &["website.pages.update"]), &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_publish_sets_timestamp() {
        let tenant = Uuid::new_v4();
        let page = WebsitePage::new(tenant, Uuid::new_v4(), "Home".into(), None, String::new(), None).unwrap();
        let mut repo = MockWebsiteRepository::new();
        repo.expect_find_page().returning(move |_, _| Ok(Some(page.clone())));
        repo.expect_update_page().times(1).returning(|p| Ok(p.clone()));

        let svc = WebsiteService::new(Arc::new(repo), EventDispatcher::default());
        let page = svc
            .publish_page(&editor(tenant, &["website.pages.publish"]), &Uuid::new_v4())
            .await
            .unwrap();
        assert!(page.is_published);
        assert!(page.published_at.is_some());
    }

    #[tokio::test]
    async fn test_public_page_not_found() {
        let mut repo = MockWebsiteRepository::new();
        repo.expect_find_published_page()
            .withf(|d, s| d == "shop.example.com" && s == "home")
            .returning(|_, _| Ok(None));

        let svc = WebsiteService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc.public_page("SHOP.example.com", "Home").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
