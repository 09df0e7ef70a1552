//! Common types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub type EntityId = Uuid;

pub fn new_id() -> EntityId {
    Uuid::new_v4()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.normalized()
    }

    /// Clamp page to >= 1 and per_page to 1..=MAX_PAGE_SIZE.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.normalized().per_page as i64
    }

    pub fn offset(&self) -> i64 {
        let p = self.normalized();
        ((p.page - 1) as i64) * p.per_page as i64
    }
}

/// One page of a listing together with the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let p = pagination.normalized();
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64 + p.per_page as u64 - 1) / p.per_page as u64) as u32
        };
        Self {
            items,
            total,
            page: p.page,
            per_page: p.per_page,
            total_pages,
        }
    }

    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_at: DateTime<Utc>,
    pub created_by: Option<EntityId>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<EntityId>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<EntityId>,
}

impl AuditFields {
    pub fn created(by: Option<EntityId>) -> Self {
        Self {
            created_by: by,
            ..Self::default()
        }
    }

    pub fn touch(&mut self, by: Option<EntityId>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }

    pub fn remove(&mut self, by: Option<EntityId>) {
        self.removed_at = Some(Utc::now());
        self.removed_by = by;
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }
}

impl Default for AuditFields {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            created_by: None,
            modified_at: None,
            modified_by: None,
            removed_at: None,
            removed_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(0, 1000);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<u8> = Page::new(vec![], 41, Pagination::new(1, 20));
        assert_eq!(page.total_pages, 3);

        let page: Page<u8> = Page::empty(Pagination::default());
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_audit_fields_remove() {
        let mut audit = AuditFields::created(None);
        assert!(!audit.is_removed());
        audit.remove(Some(new_id()));
        assert!(audit.is_removed());
    }
}
