//! Resource policies: permission checks combined with tenant ownership.

use uuid::Uuid;

use super::actor::Actor;
use crate::domain::User;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    View,
    Create,
    Update,
    Delete,
    Convert,
    Issue,
    Void,
    Publish,
    Sync,
}

impl Ability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::View => "view",
            Ability::Create => "create",
            Ability::Update => "update",
            Ability::Delete => "delete",
            Ability::Convert => "convert",
            Ability::Issue => "issue",
            Ability::Void => "void",
            Ability::Publish => "publish",
            Ability::Sync => "sync",
        }
    }
}

/// Policy for a `module.resource` permission prefix.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePolicy {
    resource: &'static str,
}

impl ResourcePolicy {
    pub const TENANTS: ResourcePolicy = ResourcePolicy::new("core.tenants");
    pub const USERS: ResourcePolicy = ResourcePolicy::new("core.users");
    pub const ROLES: ResourcePolicy = ResourcePolicy::new("core.roles");
    pub const AUDIT: ResourcePolicy = ResourcePolicy::new("core.audit");
    pub const WEBHOOKS: ResourcePolicy = ResourcePolicy::new("core.webhooks");
    pub const WORKFLOWS: ResourcePolicy = ResourcePolicy::new("core.workflows");
    pub const LEADS: ResourcePolicy = ResourcePolicy::new("crm.leads");
    pub const DEALS: ResourcePolicy = ResourcePolicy::new("crm.deals");
    pub const PRODUCTS: ResourcePolicy = ResourcePolicy::new("sales.products");
    pub const INVOICES: ResourcePolicy = ResourcePolicy::new("sales.invoices");
    pub const PAYMENTS: ResourcePolicy = ResourcePolicy::new("sales.payments");
    pub const EMPLOYEES: ResourcePolicy = ResourcePolicy::new("hr.employees");
    pub const ATTENDANCE: ResourcePolicy = ResourcePolicy::new("hr.attendance");
    pub const SITES: ResourcePolicy = ResourcePolicy::new("website.sites");
    pub const PAGES: ResourcePolicy = ResourcePolicy::new("website.pages");
    pub const REPORTS: ResourcePolicy = ResourcePolicy::new("reports");

    pub const fn new(resource: &'static str) -> Self {
        Self { resource }
    }

    pub fn permission(&self, ability: Ability) -> String {
        format!("{}.{}", self.resource, ability.as_str())
    }

    pub fn allows(&self, actor: &Actor, ability: Ability, resource_tenant: Option<Uuid>) -> bool {
        if actor.is_super_admin {
            return true;
        }
        if !actor.can(&self.permission(ability)) {
            return false;
        }
        match resource_tenant {
            Some(tenant_id) => actor.belongs_to(tenant_id),
            None => actor.tenant_id.is_some(),
        }
    }

    /// `resource_tenant` is the owning tenant of an existing record, or
    /// `None` for collection-level checks (listing, creating).
    pub fn authorize(&self, actor: &Actor, ability: Ability, resource_tenant: Option<Uuid>) -> Result<(), DomainError> {
        if self.allows(actor, ability, resource_tenant) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "missing permission {}",
                self.permission(ability)
            )))
        }
    }
}

/// Extra rules for managing user accounts.
pub struct UserPolicy;

impl UserPolicy {
    pub fn update(actor: &Actor, target: &User) -> Result<(), DomainError> {
        ResourcePolicy::USERS.authorize(actor, Ability::Update, target.tenant_id)?;
        if target.is_super_admin && !actor.is_super_admin {
            return Err(DomainError::Forbidden("only super admins may modify super admins".into()));
        }
        Ok(())
    }

    pub fn delete(actor: &Actor, target: &User) -> Result<(), DomainError> {
        if actor.user_id == target.id {
            return Err(DomainError::Forbidden("users cannot delete themselves".into()));
        }
        ResourcePolicy::USERS.authorize(actor, Ability::Delete, target.tenant_id)?;
        if target.is_super_admin && !actor.is_super_admin {
            return Err(DomainError::Forbidden("only super admins may delete super admins".into()));
        }
        Ok(())
    }

    pub fn grant_super_admin(actor: &Actor) -> Result<(), DomainError> {
        if actor.is_super_admin {
            Ok(())
        } else {
            Err(DomainError::Forbidden("only super admins may grant super admin".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(tenant: Uuid, perms: &[&str]) -> Actor {
        Actor::new(
            Uuid::new_v4(),
            Some(tenant),
            false,
            perms.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn user_in(tenant: Option<Uuid>) -> User {
        User::new(tenant, "Target".into(), "target@example.com".into(), "hash".into(), None).unwrap()
    }

    #[test]
    fn test_permission_required() {
        let tenant = Uuid::new_v4();
        let actor = member(tenant, &["crm.leads.view"]);
        assert!(ResourcePolicy::LEADS.authorize(&actor, Ability::View, Some(tenant)).is_ok());
        assert!(ResourcePolicy::LEADS.authorize(&actor, Ability::Delete, Some(tenant)).is_err());
    }

    #[test]
    fn test_other_tenant_denied_even_with_permission() {
        let actor = member(Uuid::new_v4(), &["*"]);
        let err = ResourcePolicy::LEADS
            .authorize(&actor, Ability::View, Some(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn test_user_without_delete_cannot_delete_other_tenant_user() {
        let actor = member(Uuid::new_v4(), &["core.users.view"]);
        let target = user_in(Some(Uuid::new_v4()));
        assert!(UserPolicy::delete(&actor, &target).is_err());
    }

    #[test]
    fn test_user_with_delete_cannot_delete_other_tenant_user() {
        let actor = member(Uuid::new_v4(), &["core.users.delete"]);
        let target = user_in(Some(Uuid::new_v4()));
        assert!(UserPolicy::delete(&actor, &target).is_err());
    }

    #[test]
    fn test_user_with_delete_can_delete_same_tenant_user() {
        let tenant = Uuid::new_v4();
        let actor = member(tenant, &["core.users.delete"]);
        let target = user_in(Some(tenant));
        assert!(UserPolicy::delete(&actor, &target).is_ok());
    }

    #[test]
    fn test_cannot_delete_self() {
        let tenant = Uuid::new_v4();
        let mut target = user_in(Some(tenant));
        let actor = Actor::new(target.id, Some(tenant), false, vec!["*".into()]);
        target.id = actor.user_id;
        assert!(UserPolicy::delete(&actor, &target).is_err());
    }

    #[test]
    fn test_tenant_admin_cannot_touch_super_admin() {
        let tenant = Uuid::new_v4();
        let actor = member(tenant, &["*"]);
        let mut target = user_in(Some(tenant));
        target.is_super_admin = true;
        assert!(UserPolicy::update(&actor, &target).is_err());
        assert!(UserPolicy::delete(&actor, &target).is_err());
    }

    #[test]
    fn test_super_admin_bypasses_tenant_check() {
        let actor = Actor::new(Uuid::new_v4(), None, true, vec![]);
        assert!(ResourcePolicy::INVOICES
            .authorize(&actor, Ability::Void, Some(Uuid::new_v4()))
            .is_ok());
    }

    #[test]
    fn test_tenant_permissions_need_explicit_grant() {
        let actor = member(Uuid::new_v4(), &["*"]);
        assert!(ResourcePolicy::TENANTS.authorize(&actor, Ability::Create, None).is_err());
    }
}
