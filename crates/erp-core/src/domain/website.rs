//! Website sites and pages

use chrono::{DateTime, Utc};
use erp_shared::utils::slugify;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebsiteSite {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// Globally unique.
    #[validate(length(min = 3, max = 253))]
    pub domain: String,

    #[validate(length(max = 100))]
    pub theme: Option<String>,

    pub is_published: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl WebsiteSite {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        domain: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let site = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            domain: Self::normalize_domain(&domain),
            theme: None,
            is_published: false,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        site.validate()?;
        Ok(site)
    }

    pub fn normalize_domain(domain: &str) -> String {
        domain.trim().trim_end_matches('.').to_lowercase()
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebsitePage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub site_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Unique per site.
    #[validate(length(min = 1, max = 200))]
    pub slug: String,

    pub content: String,

    #[validate(length(max = 200))]
    pub meta_title: Option<String>,

    #[validate(length(max = 500))]
    pub meta_description: Option<String>,

    pub sort_order: i32,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl WebsitePage {
    pub fn new(
        tenant_id: Uuid,
        site_id: Uuid,
        title: String,
        slug: Option<String>,
        content: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        let slug = Self::resolve_slug(&title, slug.as_deref())?;
        let page = Self {
            id: Uuid::new_v4(),
            tenant_id,
            site_id,
            title: title.trim().to_string(),
            slug,
            content,
            meta_title: None,
            meta_description: None,
            sort_order: 0,
            is_published: false,
            published_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        page.validate()?;
        Ok(page)
    }

    /// Explicit slugs are normalized too; falls back to the title.
    pub fn resolve_slug(title: &str, slug: Option<&str>) -> Result<String, DomainError> {
        let source = slug.filter(|s| !s.trim().is_empty()).unwrap_or(title);
        let slug = slugify(source);
        if slug.is_empty() {
            return Err(DomainError::ValidationError("slug cannot be empty".into()));
        }
        Ok(slug)
    }

    pub fn publish(&mut self) {
        if !self.is_published {
            self.is_published = true;
            self.published_at = Some(Utc::now());
        }
    }

    pub fn unpublish(&mut self) {
        self.is_published = false;
        self.published_at = None;
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_normalized() {
        let site = WebsiteSite::new(Uuid::nil(), "Shop".into(), " Shop.Example.COM. ".into(), None).unwrap();
        assert_eq!(site.domain, "shop.example.com");
    }

    #[test]
    fn test_slug_from_title() {
        let page = WebsitePage::new(Uuid::nil(), Uuid::nil(), "About Us!".into(), None, String::new(), None).unwrap();
        assert_eq!(page.slug, "about-us");
        let page = WebsitePage::new(Uuid::nil(), Uuid::nil(), "About".into(), Some("Team Page".into()), String::new(), None).unwrap();
        assert_eq!(page.slug, "team-page");
        assert!(WebsitePage::new(Uuid::nil(), Uuid::nil(), "!!!".into(), None, String::new(), None).is_err());
    }

    #[test]
    fn test_publish_cycle() {
        let mut page = WebsitePage::new(Uuid::nil(), Uuid::nil(), "Home".into(), None, String::new(), None).unwrap();
        page.publish();
        let first = page.published_at;
        assert!(first.is_some());
        page.publish();
        assert_eq!(page.published_at, first);
        page.unpublish();
        assert!(!page.is_published);
        assert!(page.published_at.is_none());
    }
}
