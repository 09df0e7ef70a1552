// ============================================================================
// ERP Core - User Service
// File: crates/erp-core/src/services/user_service.rs
// ============================================================================
//! Tenant user management

use std::sync::Arc;

use erp_security::PasswordService;
use erp_shared::utils::normalize_email;
use erp_shared::{Page, Pagination};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::found;
use crate::authorization::{Ability, ResourcePolicy, UserPolicy};
use crate::context::RequestContext;
use crate::domain::{Role, User};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{RoleRepository, TenantRepository, UserFilter, UserRepository};
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_super_admin: bool,
}

/// Tenantless platform account created from the console.
#[derive(Debug, Clone, Validate)]
pub struct CreateSuperAdminInput {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 2, max = 150))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub is_active: Option<bool>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub role_ids: Vec<Uuid>,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    tenants: Arc<dyn TenantRepository>,
    events: EventDispatcher,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        tenants: Arc<dyn TenantRepository>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            users,
            roles,
            tenants,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: UserFilter, pagination: Pagination) -> Result<Page<User>, DomainError> {
        ResourcePolicy::USERS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.users.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<UserWithRoles, DomainError> {
        let user = self.load(ctx, id).await?;
        ResourcePolicy::USERS.authorize(&ctx.actor, Ability::View, user.tenant_id)?;
        let role_ids = self.users.role_ids(&user.id).await?;
        Ok(UserWithRoles { user, role_ids })
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateUserInput) -> Result<User, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::USERS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        if input.is_super_admin {
            UserPolicy::grant_super_admin(&ctx.actor)?;
        }
        input.validate()?;

        let email = normalize_email(&input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::already_exists("User", "email", email));
        }

        let tenant = self
            .tenants
            .find_by_id(&tenant_id)
            .await?
            .ok_or(DomainError::TenantNotActive)?;
        if self.users.count_by_tenant(&tenant_id).await? >= tenant.max_users as i64 {
            return Err(DomainError::TenantMaxUsersReached);
        }

        let roles = self.resolve_roles(tenant_id, &input.role_ids).await?;
        PasswordService::check_strength(&input.password, &[email.as_str(), input.name.as_str()])?;
        let hash = PasswordService::hash(&input.password)?;

        let mut user = User::new(Some(tenant_id), input.name, email, hash, ctx.actor_id())?;
        user.is_super_admin = input.is_super_admin;
        let user = self.users.create(&user).await?;
        if !roles.is_empty() {
            let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
            self.users.set_roles(&user.id, &ids).await?;
        }

        info!(tenant_id = %tenant_id, user_id = %user.id, "User created");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::UserCreated, user.tenant_id, "User", user.id).with_new(&user))
            .await;
        Ok(user)
    }

    /// Bootstraps a platform operator with no tenant. Only the system actor or
    /// an existing super admin may do this.
    pub async fn create_super_admin(&self, ctx: &RequestContext, input: CreateSuperAdminInput) -> Result<User, DomainError> {
        UserPolicy::grant_super_admin(&ctx.actor)?;
        input.validate()?;

        let email = normalize_email(&input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::already_exists("User", "email", email));
        }
        PasswordService::check_strength(&input.password, &[email.as_str(), input.name.as_str()])?;
        let hash = PasswordService::hash(&input.password)?;

        let mut user = User::new(None, input.name, email, hash, ctx.actor_id())?;
        user.is_super_admin = true;
        let user = self.users.create(&user).await?;

        info!(user_id = %user.id, "Super admin created");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::UserCreated, None, "User", user.id).with_new(&user))
            .await;
        Ok(user)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateUserInput) -> Result<User, DomainError> {
        input.validate()?;
        let mut user = self.load(ctx, id).await?;
        UserPolicy::update(&ctx.actor, &user)?;
        let before = user.clone();

        if let Some(name) = input.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != user.email {
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(DomainError::already_exists("User", "email", email));
                }
                user.email = email;
            }
        }
        if let Some(active) = input.is_active {
            if !active && user.id == ctx.actor.user_id {
                return Err(DomainError::Forbidden("users cannot deactivate themselves".into()));
            }
            user.is_active = active;
        }
        if let Some(password) = input.password {
            PasswordService::check_strength(&password, &[user.email.as_str(), user.name.as_str()])?;
            user.password_hash = PasswordService::hash(&password)?;
        }
        user.touch(ctx.actor_id());
        user.validate()?;

        let user = self.users.update(&user).await?;
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::UserUpdated, user.tenant_id, "User", user.id)
                    .with_old(&before)
                    .with_new(&user),
            )
            .await;
        Ok(user)
    }

    pub async fn assign_roles(&self, ctx: &RequestContext, id: &Uuid, role_ids: Vec<Uuid>) -> Result<UserWithRoles, DomainError> {
        let user = self.load(ctx, id).await?;
        UserPolicy::update(&ctx.actor, &user)?;
        let tenant_id = user
            .tenant_id
            .ok_or_else(|| DomainError::ValidationError("platform users have no tenant roles".into()))?;

        let previous = self.users.role_ids(&user.id).await?;
        let roles = self.resolve_roles(tenant_id, &role_ids).await?;
        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        self.users.set_roles(&user.id, &ids).await?;

        info!(user_id = %user.id, roles = ids.len(), "User roles assigned");
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::UserUpdated, user.tenant_id, "User", user.id)
                    .with_old(&serde_json::json!({ "role_ids": previous }))
                    .with_new(&serde_json::json!({ "role_ids": ids })),
            )
            .await;
        Ok(UserWithRoles { user, role_ids: ids })
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let mut user = self.load(ctx, id).await?;
        UserPolicy::delete(&ctx.actor, &user)?;

        user.soft_delete(ctx.actor_id());
        self.users.update(&user).await?;

        info!(user_id = %user.id, "User deleted");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::UserDeleted, user.tenant_id, "User", user.id).with_old(&user))
            .await;
        Ok(())
    }

    /// Roles from another tenant are rejected rather than ignored.
    async fn resolve_roles(&self, tenant_id: Uuid, role_ids: &[Uuid]) -> Result<Vec<Role>, DomainError> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut wanted = role_ids.to_vec();
        wanted.sort();
        wanted.dedup();
        let roles = self.roles.find_many(&tenant_id, &wanted).await?;
        if roles.len() != wanted.len() {
            return Err(DomainError::ValidationError("role_ids contains roles outside this tenant".into()));
        }
        Ok(roles)
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid) -> Result<User, DomainError> {
        let user = found(self.users.find_by_id(&ctx.scope, id).await?, "User", id)?;
        if user.is_deleted() {
            return Err(DomainError::not_found("User", id));
        }
        // Platform accounts are only visible outside tenant scope.
        if user.tenant_id.is_none() && ctx.scope != TenantScope::All {
            return Err(DomainError::not_found("User", id));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::domain::{SubscriptionPlan, Tenant};
    use crate::repositories::{MockRoleRepository, MockTenantRepository, MockUserRepository};

    fn ctx(tenant_id: Uuid, perms: &[&str]) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, perms.iter().map(|p| p.to_string()).collect()),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn service(users: MockUserRepository, roles: MockRoleRepository, tenants: MockTenantRepository) -> UserService {
        UserService::new(Arc::new(users), Arc::new(roles), Arc::new(tenants), EventDispatcher::default())
    }

    fn create_input() -> CreateUserInput {
        CreateUserInput {
            name: "Budi Santoso".into(),
            email: "budi@acme.io".into(),
            password: "plum-orbit-Kettle-92!".into(),
            role_ids: vec![],
            is_super_admin: false,
        }
    }

    #[tokio::test]
    async fn test_user_without_delete_permission_cannot_delete_other_tenants_user() {
        let other_tenant = Uuid::new_v4();
        let target = User::new(Some(other_tenant), "Target".into(), "t@other.io".into(), "h".into(), None).unwrap();

        // A super admin scope lookup would find it; a scoped lookup does not.
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |scope, _| {
            Ok(if scope.allows(other_tenant) { Some(target.clone()) } else { None })
        });
        users.expect_update().never();

        let caller = ctx(Uuid::new_v4(), &["core.users.view"]);
        let err = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .delete(&caller, &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "User", .. }));
    }

    #[tokio::test]
    async fn test_delete_requires_permission_within_tenant() {
        let tenant = Uuid::new_v4();
        let target = User::new(Some(tenant), "Target".into(), "t@acme.io".into(), "h".into(), None).unwrap();
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |_, _| Ok(Some(target.clone())));
        users.expect_update().never();

        let caller = ctx(tenant, &["core.users.view", "core.users.update"]);
        let err = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .delete(&caller, &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let tenant = Uuid::new_v4();
        let caller = ctx(tenant, &["core.users.*"]);
        let mut me = User::new(Some(tenant), "Me".into(), "me@acme.io".into(), "h".into(), None).unwrap();
        me.id = caller.actor.user_id;

        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |_, _| Ok(Some(me.clone())));

        let id = caller.actor.user_id;
        let err = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .delete(&caller, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_respects_max_users() {
        let tenant = Tenant::new("Acme".into(), "acme".into(), 2, SubscriptionPlan::Free, "UTC".into(), None).unwrap();
        let caller = ctx(tenant.id, &["core.users.create"]);

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_count_by_tenant().returning(|_| Ok(2));
        users.expect_create().never();
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));

        let err = service(users, MockRoleRepository::new(), tenants)
            .create(&caller, create_input())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::TenantMaxUsersReached);
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_roles() {
        let tenant = Tenant::new("Acme".into(), "acme".into(), 20, SubscriptionPlan::Free, "UTC".into(), None).unwrap();
        let caller = ctx(tenant.id, &["core.users.create"]);

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_count_by_tenant().returning(|_| Ok(1));
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));
        let mut roles = MockRoleRepository::new();
        roles.expect_find_many().returning(|_, _| Ok(vec![]));

        let mut input = create_input();
        input.role_ids = vec![Uuid::new_v4()];
        let err = service(users, roles, tenants).create(&caller, input).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_only_super_admin_grants_super_admin() {
        let caller = ctx(Uuid::new_v4(), &["core.users.*"]);
        let mut input = create_input();
        input.is_super_admin = true;
        let err = service(MockUserRepository::new(), MockRoleRepository::new(), MockTenantRepository::new())
            .create(&caller, input)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    fn super_admin_input() -> CreateSuperAdminInput {
        CreateSuperAdminInput {
            name: "Platform Ops".into(),
            email: "Ops@Platform.io".into(),
            password: "plum-orbit-Kettle-92!".into(),
        }
    }

    #[tokio::test]
    async fn test_console_creates_tenantless_super_admin() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().withf(|email| email == "ops@platform.io").returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|u: &User| {
                u.tenant_id.is_none()
                    && u.is_super_admin
                    && u.created_by.is_none()
                    && PasswordService::verify("plum-orbit-Kettle-92!", &u.password_hash).unwrap_or(false)
            })
            .times(1)
            .returning(|u| Ok(u.clone()));

        let user = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .create_super_admin(&RequestContext::system(TenantScope::All), super_admin_input())
            .await
            .unwrap();
        assert_eq!(user.email, "ops@platform.io");
        assert!(user.is_super_admin);
    }

    #[tokio::test]
    async fn test_super_admin_email_must_be_unused() {
        let existing = User::new(None, "Ops".into(), "ops@platform.io".into(), "h".into(), None).unwrap();
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| Ok(Some(existing.clone())));
        users.expect_create().never();

        let err = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .create_super_admin(&RequestContext::system(TenantScope::All), super_admin_input())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { entity: "User", .. }));
    }

    #[tokio::test]
    async fn test_weak_super_admin_password_rejected() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_create().never();

        let mut input = super_admin_input();
        input.password = "password".into();
        let err = service(users, MockRoleRepository::new(), MockTenantRepository::new())
            .create_super_admin(&RequestContext::system(TenantScope::All), input)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::PasswordTooWeak);
    }

    #[tokio::test]
    async fn test_tenant_admin_cannot_create_super_admin() {
        let caller = ctx(Uuid::new_v4(), &["*"]);
        let err = service(MockUserRepository::new(), MockRoleRepository::new(), MockTenantRepository::new())
            .create_super_admin(&caller, super_admin_input())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
