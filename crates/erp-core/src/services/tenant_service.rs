// ============================================================================
// ERP Core - Tenant Service
// File: crates/erp-core/src/services/tenant_service.rs
// ============================================================================
//! Tenant lifecycle, restricted to super admins

use std::sync::Arc;

use erp_security::PasswordService;
use erp_shared::utils::slugify;
use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::found;
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{DefaultRole, SubscriptionPlan, Tenant, User};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{RoleRepository, TenantRepository, UserRepository};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TenantAdminInput {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantInput {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub max_users: Option<i32>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub timezone: Option<String>,
    /// First tenant administrator.
    #[validate(nested)]
    pub admin: Option<TenantAdminInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTenantInput {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub max_users: Option<i32>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub timezone: Option<String>,
}

const DEFAULT_MAX_USERS: i32 = 10;

pub struct TenantService {
    tenants: Arc<dyn TenantRepository>,
    roles: Arc<dyn RoleRepository>,
    users: Arc<dyn UserRepository>,
    events: EventDispatcher,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        roles: Arc<dyn RoleRepository>,
        users: Arc<dyn UserRepository>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            tenants,
            roles,
            users,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, search: Option<String>, pagination: Pagination) -> Result<Page<Tenant>, DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::View, None)?;
        self.tenants.list(search, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Tenant, DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::View, Some(*id))?;
        found(self.tenants.find_by_id(id).await?, "Tenant", id)
    }

    /// Creates the tenant, seeds the default roles and optionally the first
    /// administrator account.
    pub async fn create(&self, ctx: &RequestContext, input: CreateTenantInput) -> Result<Tenant, DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::Create, None)?;
        input.validate()?;

        let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
        if self.tenants.find_by_slug(&slug).await?.is_some() {
            return Err(DomainError::already_exists("Tenant", "slug", slug));
        }

        let admin = match &input.admin {
            Some(admin) => {
                if self.users.find_by_email(&admin.email.trim().to_lowercase()).await?.is_some() {
                    return Err(DomainError::already_exists("User", "email", admin.email.clone()));
                }
                PasswordService::check_strength(&admin.password, &[admin.email.as_str(), admin.name.as_str()])?;
                Some(admin.clone())
            }
            None => None,
        };

        let tenant = Tenant::new(
            input.name,
            slug,
            input.max_users.unwrap_or(DEFAULT_MAX_USERS),
            input.subscription_plan.unwrap_or_default(),
            input.timezone.unwrap_or_else(|| "UTC".to_string()),
            ctx.actor_id(),
        )?;
        let tenant = self.tenants.create(&tenant).await?;

        let mut admin_role_id = None;
        for default in DefaultRole::ALL {
            let role = self.roles.create(&default.build(tenant.id, ctx.actor_id())).await?;
            if default == DefaultRole::Administrator {
                admin_role_id = Some(role.id);
            }
        }

        if let (Some(admin), Some(role_id)) = (admin, admin_role_id) {
            let hash = PasswordService::hash(&admin.password)?;
            let user = User::new(Some(tenant.id), admin.name, admin.email, hash, ctx.actor_id())?;
            let user = self.users.create(&user).await?;
            self.users.set_roles(&user.id, &[role_id]).await?;
            info!(tenant_id = %tenant.id, user_id = %user.id, "Tenant administrator created");
        }

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::TenantCreated, Some(tenant.id), "Tenant", tenant.id)
                    .with_new(&tenant),
            )
            .await;
        Ok(tenant)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateTenantInput) -> Result<Tenant, DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::Update, Some(*id))?;
        input.validate()?;
        let mut tenant = found(self.tenants.find_by_id(id).await?, "Tenant", id)?;
        let before = tenant.clone();

        if let Some(name) = input.name {
            tenant.name = name.trim().to_string();
        }
        if let Some(max_users) = input.max_users {
            tenant.max_users = max_users;
        }
        if let Some(plan) = input.subscription_plan {
            tenant.subscription_plan = plan;
        }
        if let Some(timezone) = input.timezone {
            tenant.timezone = timezone;
        }
        tenant.modified_at = Some(chrono::Utc::now());
        tenant.modified_by = ctx.actor_id();
        tenant.validate()?;

        self.save(ctx, before, tenant).await
    }

    pub async fn set_active(&self, ctx: &RequestContext, id: &Uuid, active: bool) -> Result<Tenant, DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::Update, Some(*id))?;
        let mut tenant = found(self.tenants.find_by_id(id).await?, "Tenant", id)?;
        let before = tenant.clone();
        if active {
            tenant.activate(ctx.actor_id());
        } else {
            tenant.suspend(ctx.actor_id());
        }
        info!(tenant_id = %id, active, "Tenant status changed");
        self.save(ctx, before, tenant).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        ResourcePolicy::TENANTS.authorize(&ctx.actor, Ability::Delete, Some(*id))?;
        let mut tenant = found(self.tenants.find_by_id(id).await?, "Tenant", id)?;
        tenant.soft_delete(ctx.actor_id());
        self.tenants.update(&tenant).await?;

        info!(tenant_id = %id, "Tenant deleted");
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::TenantDeleted, Some(tenant.id), "Tenant", tenant.id)
                    .with_old(&tenant),
            )
            .await;
        Ok(())
    }

    async fn save(&self, ctx: &RequestContext, before: Tenant, tenant: Tenant) -> Result<Tenant, DomainError> {
        let tenant = self.tenants.update(&tenant).await?;
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::TenantUpdated, Some(tenant.id), "Tenant", tenant.id)
                    .with_old(&before)
                    .with_new(&tenant),
            )
            .await;
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::domain::Role;
    use crate::repositories::{MockRoleRepository, MockTenantRepository, MockUserRepository};
    use crate::tenancy::TenantScope;

    fn super_admin() -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), None, true, vec![]),
            TenantScope::All,
            RequestMeta::default(),
        )
    }

    fn input(admin: Option<TenantAdminInput>) -> CreateTenantInput {
        CreateTenantInput {
            name: "Acme Trading".into(),
            slug: None,
            max_users: None,
            subscription_plan: None,
            timezone: None,
            admin,
        }
    }

    #[tokio::test]
    async fn test_create_seeds_roles_and_admin() {
        let mut tenants = MockTenantRepository::new();
        tenants
            .expect_find_by_slug()
            .withf(|slug: &str| slug == "acme-trading")
            .returning(|_| Ok(None));
        tenants.expect_create().times(1).returning(|t| Ok(t.clone()));

        let mut roles = MockRoleRepository::new();
        roles.expect_create().times(3).returning(|r: &Role| Ok(r.clone()));

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_create().times(1).returning(|u| Ok(u.clone()));
        users
            .expect_set_roles()
            .withf(|_, roles: &[Uuid]| roles.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = TenantService::new(Arc::new(tenants), Arc::new(roles), Arc::new(users), EventDispatcher::default());
        let tenant = svc
            .create(
                &super_admin(),
                input(Some(TenantAdminInput {
                    name: "Owner".into(),
                    email: "owner@acme.io".into(),
                    password: "Tr0ub4dor&3-horse-staple".into(),
                })),
            )
            .await
            .unwrap();

        assert_eq!(tenant.slug, "acme-trading");
        assert_eq!(tenant.max_users, DEFAULT_MAX_USERS);
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let existing = Tenant::new("Acme".into(), "acme-trading".into(), 5, SubscriptionPlan::Free, "UTC".into(), None).unwrap();
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_slug().returning(move |_| Ok(Some(existing.clone())));

        let svc = TenantService::new(
            Arc::new(tenants),
            Arc::new(MockRoleRepository::new()),
            Arc::new(MockUserRepository::new()),
            EventDispatcher::default(),
        );
        let err = svc.create(&super_admin(), input(None)).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { field: "slug", .. }));
    }

    #[tokio::test]
    async fn test_tenant_admin_cannot_manage_tenants() {
        let tenant_id = Uuid::new_v4();
        let ctx = RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        );
        let svc = TenantService::new(
            Arc::new(MockTenantRepository::new()),
            Arc::new(MockRoleRepository::new()),
            Arc::new(MockUserRepository::new()),
            EventDispatcher::default(),
        );
        assert!(matches!(svc.get(&ctx, &tenant_id).await, Err(DomainError::Forbidden(_))));
        assert!(matches!(svc.create(&ctx, input(None)).await, Err(DomainError::Forbidden(_))));
    }
}
