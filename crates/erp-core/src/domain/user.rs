//! User domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use erp_shared::utils::normalize_email;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: Uuid,
    /// `None` only for platform super admins.
    pub tenant_id: Option<Uuid>,

    #[validate(length(min = 2, max = 150))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub is_super_admin: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl User {
    pub fn new(
        tenant_id: Option<Uuid>,
        name: String,
        email: String,
        password_hash: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let user = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            email: normalize_email(&email),
            password_hash,
            is_super_admin: false,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
            removed_at: None,
            removed_by: None,
        };
        user.validate()?;
        Ok(user)
    }

    pub fn is_deleted(&self) -> bool {
        self.removed_at.is_some()
    }

    pub fn can_login(&self) -> bool {
        self.is_active && !self.is_deleted()
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }

    pub fn soft_delete(&mut self, by: Option<Uuid>) {
        self.removed_at = Some(Utc::now());
        self.removed_by = by;
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new(None, " Jane ".into(), " Jane@Example.com".into(), "h".into(), None).unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.name, "Jane");
        assert!(user.can_login());
    }

    #[test]
    fn test_invalid_email_rejected() {
        assert!(User::new(None, "Jane".into(), "not-an-email".into(), "h".into(), None).is_err());
    }

    #[test]
    fn test_deleted_user_cannot_login() {
        let mut user = User::new(None, "Jane".into(), "jane@example.com".into(), "h".into(), None).unwrap();
        user.soft_delete(None);
        assert!(!user.can_login());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(None, "Jane".into(), "jane@example.com".into(), "secret-hash".into(), None).unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
