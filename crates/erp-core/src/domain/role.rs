//! Role entity and the roles seeded for every new tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    /// Permission keys or wildcards granted by this role.
    pub permissions: Vec<String>,

    /// Seeded roles cannot be deleted.
    pub is_system: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Role {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        description: Option<String>,
        permissions: Vec<String>,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let mut permissions = permissions;
        permissions.sort();
        permissions.dedup();
        let role = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            description,
            permissions,
            is_system: false,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        role.validate()?;
        Ok(role)
    }

    pub fn set_permissions(&mut self, permissions: Vec<String>, by: Option<Uuid>) {
        let mut permissions = permissions;
        permissions.sort();
        permissions.dedup();
        self.permissions = permissions;
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRole {
    Administrator,
    Sales,
    Employee,
}

impl DefaultRole {
    pub const ALL: [DefaultRole; 3] = [DefaultRole::Administrator, DefaultRole::Sales, DefaultRole::Employee];

    pub fn name(&self) -> &'static str {
        match self {
            DefaultRole::Administrator => "Administrator",
            DefaultRole::Sales => "Sales",
            DefaultRole::Employee => "Employee",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DefaultRole::Administrator => "Full access to the tenant",
            DefaultRole::Sales => "CRM and sales",
            DefaultRole::Employee => "Own attendance",
        }
    }

    pub fn permissions(&self) -> Vec<String> {
        let keys: &[&str] = match self {
            DefaultRole::Administrator => &["*"],
            DefaultRole::Sales => &["crm.*", "sales.*", "reports.view"],
            DefaultRole::Employee => &["hr.attendance.view"],
        };
        keys.iter().map(|k| k.to_string()).collect()
    }

    pub fn build(&self, tenant_id: Uuid, created_by: Option<Uuid>) -> Role {
        Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            permissions: self.permissions(),
            is_system: true,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        }
    }
}
