// ============================================================================
// ERP Core - Tenant Entity
// File: crates/erp-core/src/domain/tenant.rs
// Description: Tenant entity with subscription management
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Subscription plan enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionPlan::Free),
            "basic" => Some(SubscriptionPlan::Basic),
            "premium" => Some(SubscriptionPlan::Premium),
            "enterprise" => Some(SubscriptionPlan::Enterprise),
            _ => None,
        }
    }
}

/// Tenant entity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Tenant {
    pub id: Uuid,

    #[validate(length(min = 2, max = 100, message = "Tenant name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 2, max = 100, message = "Slug must be between 2 and 100 characters"))]
    pub slug: String,

    pub is_active: bool,

    #[validate(range(min = 1, max = 10000, message = "Max users must be between 1 and 10000"))]
    pub max_users: i32,

    pub subscription_plan: SubscriptionPlan,

    #[validate(length(min = 1, max = 64))]
    pub timezone: String,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl Tenant {
    pub fn new(
        name: String,
        slug: String,
        max_users: i32,
        subscription_plan: SubscriptionPlan,
        timezone: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let tenant = Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            slug: slug.trim().to_lowercase(),
            is_active: true,
            max_users,
            subscription_plan,
            timezone,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
            removed_at: None,
            removed_by: None,
        };

        tenant.validate()?;
        Ok(tenant)
    }

    pub fn suspend(&mut self, by: Option<Uuid>) {
        self.is_active = false;
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }

    pub fn activate(&mut self, by: Option<Uuid>) {
        self.is_active = true;
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }

    pub fn soft_delete(&mut self, deleted_by: Option<Uuid>) {
        self.removed_at = Some(Utc::now());
        self.removed_by = deleted_by;
        self.is_active = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.removed_at.is_some()
    }

    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        Tenant::new(
            "Acme Corp".to_string(),
            " Acme ".to_string(),
            25,
            SubscriptionPlan::Basic,
            "UTC".to_string(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_create_tenant_normalizes_slug() {
        assert_eq!(tenant().slug, "acme");
    }

    #[test]
    fn test_invalid_max_users() {
        let result = Tenant::new("Acme".into(), "acme".into(), 0, SubscriptionPlan::Free, "UTC".into(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_suspend_and_delete() {
        let mut t = tenant();
        t.suspend(None);
        assert!(!t.is_usable());
        t.activate(None);
        assert!(t.is_usable());
        t.soft_delete(None);
        assert!(t.is_deleted());
        assert!(!t.is_usable());
    }
}
