//! Tenant scoping applied to every repository query.

use serde::Serialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantScope {
    /// Only rows owned by this tenant.
    Tenant(Uuid),
    /// Every tenant. Only super admins and the system actor get this scope.
    All,
}

impl TenantScope {
    /// Resolve the scope for an actor and an optional tenant selection
    /// (the `X-Tenant-ID` header). Super admins see every tenant unless they
    /// select one, even when their account carries a home tenant.
    pub fn for_actor(actor: &Actor, requested: Option<Uuid>) -> Result<Self, DomainError> {
        if actor.is_super_admin {
            return Ok(requested.map(TenantScope::Tenant).unwrap_or(TenantScope::All));
        }
        let own = actor.tenant_id.ok_or(DomainError::TenantRequired)?;
        match requested {
            Some(id) if id != own => Err(DomainError::Forbidden(
                "cannot act on behalf of another tenant".into(),
            )),
            _ => Ok(TenantScope::Tenant(own)),
        }
    }

    /// Tenant id to bind into `($n::uuid IS NULL OR tenant_id = $n)` filters.
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Tenant(id) => Some(*id),
            TenantScope::All => None,
        }
    }

    pub fn require_tenant(&self) -> Result<Uuid, DomainError> {
        self.tenant_id().ok_or(DomainError::TenantRequired)
    }

    pub fn allows(&self, tenant_id: Uuid) -> bool {
        match self {
            TenantScope::Tenant(id) => *id == tenant_id,
            TenantScope::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_is_pinned_to_own_tenant() {
        let tenant = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), Some(tenant), false, vec![]);
        assert_eq!(TenantScope::for_actor(&actor, None).unwrap(), TenantScope::Tenant(tenant));
        assert_eq!(
            TenantScope::for_actor(&actor, Some(tenant)).unwrap(),
            TenantScope::Tenant(tenant)
        );
        assert!(matches!(
            TenantScope::for_actor(&actor, Some(Uuid::new_v4())),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_member_without_tenant_rejected() {
        let actor = Actor::new(Uuid::new_v4(), None, false, vec![]);
        assert_eq!(TenantScope::for_actor(&actor, None), Err(DomainError::TenantRequired));
    }

    #[test]
    fn test_super_admin_scopes() {
        let actor = Actor::new(Uuid::new_v4(), None, true, vec![]);
        assert_eq!(TenantScope::for_actor(&actor, None).unwrap(), TenantScope::All);
        let tenant = Uuid::new_v4();
        assert_eq!(
            TenantScope::for_actor(&actor, Some(tenant)).unwrap(),
            TenantScope::Tenant(tenant)
        );
    }

    #[test]
    fn test_super_admin_with_home_tenant_is_not_narrowed() {
        let home = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), Some(home), true, vec![]);
        assert_eq!(TenantScope::for_actor(&actor, None).unwrap(), TenantScope::All);
        let other = Uuid::new_v4();
        assert_eq!(
            TenantScope::for_actor(&actor, Some(other)).unwrap(),
            TenantScope::Tenant(other)
        );
    }

    #[test]
    fn test_allows_and_require() {
        let tenant = Uuid::new_v4();
        let scope = TenantScope::Tenant(tenant);
        assert!(scope.allows(tenant));
        assert!(!scope.allows(Uuid::new_v4()));
        assert!(TenantScope::All.allows(tenant));
        assert_eq!(TenantScope::All.require_tenant(), Err(DomainError::TenantRequired));
    }
}
