//! Role management and the permission catalog

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::found;
use crate::authorization::catalog::{self, PermissionDef};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::Role;
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::RoleRepository;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    events: EventDispatcher,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleRepository>, events: EventDispatcher) -> Self {
        Self { roles, events }
    }

    pub fn catalog() -> &'static [PermissionDef] {
        catalog::PERMISSIONS
    }

    /// Rejects unknown keys and tenant-level grants.
    pub fn validate_grants(permissions: &[String]) -> Result<(), DomainError> {
        for grant in permissions {
            if !catalog::is_valid_grant(grant) {
                return Err(DomainError::ValidationError(format!("unknown permission {}", grant)));
            }
            if grant.starts_with(catalog::SUPER_ADMIN_PREFIX) {
                return Err(DomainError::ValidationError(format!(
                    "{} can only be held by super admins",
                    grant
                )));
            }
        }
        Ok(())
    }

    pub async fn list(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Page<Role>, DomainError> {
        ResourcePolicy::ROLES.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.roles.list(&ctx.scope, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Role, DomainError> {
        let role = found(self.roles.find_by_id(&ctx.scope, id).await?, "Role", id)?;
        ResourcePolicy::ROLES.authorize(&ctx.actor, Ability::View, Some(role.tenant_id))?;
        Ok(role)
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateRoleInput) -> Result<Role, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::ROLES.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;
        Self::validate_grants(&input.permissions)?;

        if self.roles.find_by_name(&tenant_id, input.name.trim()).await?.is_some() {
            return Err(DomainError::already_exists("Role", "name", input.name.trim()));
        }

        let role = Role::new(tenant_id, input.name, input.description, input.permissions, ctx.actor_id())?;
        let role = self.roles.create(&role).await?;
        info!(tenant_id = %tenant_id, role_id = %role.id, "Role created");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::RoleCreated, Some(tenant_id), "Role", role.id).with_new(&role))
            .await;
        Ok(role)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateRoleInput) -> Result<Role, DomainError> {
        input.validate()?;
        let mut role = self.get_for(ctx, id, Ability::Update).await?;
        let before = role.clone();

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name != role.name {
                if role.is_system {
                    return Err(DomainError::Conflict("system roles cannot be renamed".into()));
                }
                if self.roles.find_by_name(&role.tenant_id, &name).await?.is_some() {
                    return Err(DomainError::already_exists("Role", "name", name));
                }
                role.name = name;
            }
        }
        if input.description.is_some() {
            role.description = input.description;
        }
        role.modified_at = Some(chrono::Utc::now());
        role.modified_by = ctx.actor_id();

        self.save(ctx, before, role).await
    }

    pub async fn set_permissions(&self, ctx: &RequestContext, id: &Uuid, permissions: Vec<String>) -> Result<Role, DomainError> {
        Self::validate_grants(&permissions)?;
        let mut role = self.get_for(ctx, id, Ability::Update).await?;
        let before = role.clone();
        role.set_permissions(permissions, ctx.actor_id());
        self.save(ctx, before, role).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let role = self.get_for(ctx, id, Ability::Delete).await?;
        if role.is_system {
            return Err(DomainError::Conflict("system roles cannot be deleted".into()));
        }
        let assigned = self.roles.count_users(&role.id).await?;
        if assigned > 0 {
            return Err(DomainError::Conflict(format!(
                "role is assigned to {} user(s)",
                assigned
            )));
        }
        self.roles.delete(&role.id).await?;

        info!(role_id = %role.id, "Role deleted");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::RoleDeleted, Some(role.tenant_id), "Role", role.id).with_old(&role))
            .await;
        Ok(())
    }

    async fn get_for(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Role, DomainError> {
        let role = found(self.roles.find_by_id(&ctx.scope, id).await?, "Role", id)?;
        ResourcePolicy::ROLES.authorize(&ctx.actor, ability, Some(role.tenant_id))?;
        Ok(role)
    }

    async fn save(&self, ctx: &RequestContext, before: Role, role: Role) -> Result<Role, DomainError> {
        let role = self.roles.update(&role).await?;
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::RoleUpdated, Some(role.tenant_id), "Role", role.id)
                    .with_old(&before)
                    .with_new(&role),
            )
            .await;
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::MockRoleRepository;
    use crate::tenancy::TenantScope;

    fn admin(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["core.roles.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    #[test]
    fn test_validate_grants() {
        assert!(RoleService::validate_grants(&["crm.*".into(), "reports.view".into(), "*".into()]).is_ok());
        assert!(RoleService::validate_grants(&["crm.widgets.view".into()]).is_err());
        assert!(RoleService::validate_grants(&["core.tenants.view".into()]).is_err());
    }

    #[tokio::test]
    async fn test_delete_assigned_role_conflicts() {
        let tenant = Uuid::new_v4();
        let role = Role::new(tenant, "Support".into(), None, vec![], None).unwrap();
        let mut roles = MockRoleRepository::new();
        roles.expect_find_by_id().returning(move |_, _| Ok(Some(role.clone())));
        roles.expect_count_users().returning(|_| Ok(3));
        roles.expect_delete().never();

        let svc = RoleService::new(Arc::new(roles), EventDispatcher::default());
        let err = svc.delete(&admin(tenant), &Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_system_role_cannot_be_deleted() {
        let tenant = Uuid::new_v4();
        let role = crate::domain::DefaultRole::Sales.build(tenant, None);
        let mut roles = MockRoleRepository::new();
        roles.expect_find_by_id().returning(move |_, _| Ok(Some(role.clone())));

        let svc = RoleService::new(Arc::new(roles), EventDispatcher::default());
        assert!(matches!(
            svc.delete(&admin(tenant), &Uuid::new_v4()).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_set_permissions_sorts_and_saves() {
        let tenant = Uuid::new_v4();
        let role = Role::new(tenant, "Support".into(), None, vec![], None).unwrap();
        let mut roles = MockRoleRepository::new();
        roles.expect_find_by_id().returning(move |_, _| Ok(Some(role.clone())));
        roles
            .expect_update()
            .withf(|r: &Role| r.permissions == vec!["crm.leads.view".to_string(), "reports.view".to_string()])
            .returning(|r| Ok(r.clone()));

        let svc = RoleService::new(Arc::new(roles), EventDispatcher::default());
        svc.set_permissions(&admin(tenant), &Uuid::new_v4(), vec!["reports.view".into(), "crm.leads.view".into()])
            .await
            .unwrap();
    }
}
