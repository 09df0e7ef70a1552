//! The authenticated caller of a domain operation.

use serde::Serialize;
use uuid::Uuid;

use super::catalog::permission_matches;

#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub is_super_admin: bool,
    /// Raw grants from the actor's roles, wildcards included.
    pub permissions: Vec<String>,
}

impl Actor {
    pub fn new(user_id: Uuid, tenant_id: Option<Uuid>, is_super_admin: bool, permissions: Vec<String>) -> Self {
        Self {
            user_id,
            tenant_id,
            is_super_admin,
            permissions,
        }
    }

    /// Console commands and scheduled jobs run as the system actor.
    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
            tenant_id: None,
            is_super_admin: true,
            permissions: Vec::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id.is_nil()
    }

    /// User id to attribute changes to, `None` for the system actor.
    pub fn actor_id(&self) -> Option<Uuid> {
        if self.is_system() {
            None
        } else {
            Some(self.user_id)
        }
    }

    pub fn can(&self, permission: &str) -> bool {
        self.is_super_admin || self.permissions.iter().any(|g| permission_matches(g, permission))
    }

    pub fn belongs_to(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_with_grants() {
        let actor = Actor::new(Uuid::new_v4(), Some(Uuid::new_v4()), false, vec!["crm.*".into()]);
        assert!(actor.can("crm.leads.delete"));
        assert!(!actor.can("core.users.delete"));
    }

    #[test]
    fn test_system_actor() {
        let actor = Actor::system();
        assert!(actor.is_system());
        assert!(actor.can("core.tenants.delete"));
        assert_eq!(actor.actor_id(), None);
    }
}
