// ============================================================================
// ERP Core - Authentication Service
// File: crates/erp-core/src/services/auth_service.rs
// ============================================================================
//! Login, token refresh, caller resolution and password changes

use std::sync::Arc;

use erp_security::{JwtService, PasswordService, TokenPair};
use erp_shared::constants::{TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use erp_shared::utils::{mask_email, normalize_email};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::authorization::{catalog, Actor};
use crate::context::{RequestContext, RequestMeta};
use crate::domain::{Tenant, User};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{TenantRepository, UserRepository};
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user: User,
    pub tokens: TokenPair,
    pub permissions: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResult {
    pub user: User,
    pub permissions: Vec<&'static str>,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
    jwt: JwtService,
    events: EventDispatcher,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
        jwt: JwtService,
        events: EventDispatcher,
    ) -> Self {
        Self {
            users,
            tenants,
            jwt,
            events,
        }
    }

    pub async fn login(&self, input: LoginInput, meta: RequestMeta) -> Result<LoginResult, DomainError> {
        input.validate()?;
        let email = normalize_email(&input.email);
        info!("Login attempt for {}", mask_email(&email));

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or_else(|| {
                warn!("Login failed: unknown email {}", mask_email(&email));
                DomainError::InvalidCredentials
            })?;

        let valid = PasswordService::verify(&input.password, &user.password_hash)
            .map_err(|_| DomainError::InvalidCredentials)?;
        if !valid {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(DomainError::InvalidCredentials);
        }
        if !user.can_login() {
            warn!(user_id = %user.id, "Login failed: user inactive");
            return Err(DomainError::UserNotActive);
        }
        if let Some(tenant_id) = user.tenant_id {
            self.ensure_tenant_active(&tenant_id).await?;
        }

        let tokens = self.jwt.generate_pair(&user.id, user.tenant_id)?;

        user.record_login();
        if let Err(e) = self.users.update(&user).await {
            error!(user_id = %user.id, "Failed to record last login: {}", e);
        }

        let grants = self.users.permissions_for(&user.id).await?;
        let permissions = Self::effective(&user, &grants);

        let mut event = DomainEvent::new(EventName::UserLoggedIn, "User", Some(user.id));
        event.tenant_id = user.tenant_id;
        event.actor_id = Some(user.id);
        event.meta = meta;
        self.events.dispatch(event).await;

        info!(user_id = %user.id, "Login successful");
        Ok(LoginResult {
            user,
            tokens,
            permissions,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        let claims = self.jwt.validate_typed(refresh_token, TOKEN_TYPE_REFRESH)?;
        let user = self.load_active_user(claims.user_id()?).await?;
        Ok(self.jwt.generate_pair(&user.id, user.tenant_id)?)
    }

    /// Resolves a bearer access token into the calling actor.
    pub async fn authenticate(&self, access_token: &str) -> Result<Actor, DomainError> {
        let claims = self.jwt.validate_typed(access_token, TOKEN_TYPE_ACCESS)?;
        let user = self.load_active_user(claims.user_id()?).await?;
        let permissions = self.users.permissions_for(&user.id).await?;
        Ok(Actor::new(user.id, user.tenant_id, user.is_super_admin, permissions))
    }

    pub async fn me(&self, ctx: &RequestContext) -> Result<MeResult, DomainError> {
        let user = self
            .users
            .find_by_id(&TenantScope::All, &ctx.actor.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", ctx.actor.user_id))?;
        let permissions = Self::effective(&user, &ctx.actor.permissions);
        Ok(MeResult { user, permissions })
    }

    pub async fn change_password(&self, ctx: &RequestContext, input: ChangePasswordInput) -> Result<(), DomainError> {
        input.validate()?;
        let mut user = self
            .users
            .find_by_id(&TenantScope::All, &ctx.actor.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", ctx.actor.user_id))?;

        if !PasswordService::verify(&input.current_password, &user.password_hash)? {
            return Err(DomainError::InvalidCredentials);
        }
        PasswordService::check_strength(&input.new_password, &[user.email.as_str(), user.name.as_str()])?;

        user.password_hash = PasswordService::hash(&input.new_password)?;
        user.touch(ctx.actor_id());
        self.users.update(&user).await?;

        info!(user_id = %user.id, "Password changed");
        self.events
            .dispatch(DomainEvent::from_context(ctx, EventName::UserUpdated, user.tenant_id, "User", user.id))
            .await;
        Ok(())
    }

    /// Missing, suspended and deleted tenants are all reported as inactive.
    pub async fn ensure_tenant_active(&self, tenant_id: &Uuid) -> Result<Tenant, DomainError> {
        match self.tenants.find_by_id(tenant_id).await? {
            Some(tenant) if tenant.is_usable() => Ok(tenant),
            _ => Err(DomainError::TenantNotActive),
        }
    }

    async fn load_active_user(&self, user_id: Uuid) -> Result<User, DomainError> {
        let user = self
            .users
            .find_by_id(&TenantScope::All, &user_id)
            .await?
            .ok_or_else(|| DomainError::InvalidToken("unknown subject".into()))?;
        if !user.can_login() {
            return Err(DomainError::UserNotActive);
        }
        if let Some(tenant_id) = user.tenant_id {
            self.ensure_tenant_active(&tenant_id).await?;
        }
        Ok(user)
    }

    fn effective(user: &User, grants: &[String]) -> Vec<&'static str> {
        if user.is_super_admin {
            catalog::PERMISSIONS.iter().map(|p| p.key).collect()
        } else {
            catalog::expand(grants)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubscriptionPlan;
    use crate::repositories::{MockTenantRepository, MockUserRepository};

    const SECRET: &str = "test-secret-that-is-long-enough-0123456789";

    fn jwt() -> JwtService {
        JwtService::new(SECRET, 900, 3600)
    }

    fn user(tenant_id: Uuid, password: &str) -> User {
        let hash = PasswordService::hash(password).unwrap();
        User::new(Some(tenant_id), "Jane Doe".into(), "jane@acme.io".into(), hash, None).unwrap()
    }

    fn tenant(active: bool) -> Tenant {
        let mut t = Tenant::new("Acme".into(), "acme".into(), 10, SubscriptionPlan::Free, "UTC".into(), None).unwrap();
        t.is_active = active;
        t
    }

    fn service(users: MockUserRepository, tenants: MockTenantRepository) -> AuthService {
        AuthService::new(Arc::new(users), Arc::new(tenants), jwt(), EventDispatcher::default())
    }

    fn login_input(password: &str) -> LoginInput {
        LoginInput {
            email: "Jane@Acme.io".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let t = tenant(true);
        let u = user(t.id, "correct horse battery");
        let found = u.clone();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .withf(|email: &str| email == "jane@acme.io")
            .returning(move |_| Ok(Some(found.clone())));
        users
            .expect_update()
            .withf(|u: &User| u.last_login_at.is_some())
            .returning(|u| Ok(u.clone()));
        users
            .expect_permissions_for()
            .returning(|_| Ok(vec!["crm.leads.*".into()]));

        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(t.clone())));

        let result = service(users, tenants)
            .login(login_input("correct horse battery"), RequestMeta::default())
            .await
            .unwrap();

        assert_eq!(result.user.id, u.id);
        assert!(result.permissions.contains(&"crm.leads.convert"));
        let claims = jwt().validate_typed(&result.tokens.access_token, TOKEN_TYPE_ACCESS).unwrap();
        assert_eq!(claims.tenant_id, u.tenant_id);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let u = user(Uuid::new_v4(), "correct horse battery");
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| Ok(Some(u.clone())));

        let err = service(users, MockTenantRepository::new())
            .login(login_input("wrong password!"), RequestMeta::default())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_rejects_suspended_tenant() {
        let t = tenant(false);
        let u = user(t.id, "correct horse battery");
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| Ok(Some(u.clone())));
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(t.clone())));

        let err = service(users, tenants)
            .login(login_input("correct horse battery"), RequestMeta::default())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::TenantNotActive);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_refresh_token() {
        let token = jwt().generate_refresh_token(&Uuid::new_v4(), None).unwrap();
        let err = service(MockUserRepository::new(), MockTenantRepository::new())
            .authenticate(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_authenticate_builds_actor() {
        let t = tenant(true);
        let u = user(t.id, "correct horse battery");
        let token = jwt().generate_access_token(&u.id, u.tenant_id).unwrap();
        let found = u.clone();

        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |_, _| Ok(Some(found.clone())));
        users
            .expect_permissions_for()
            .returning(|_| Ok(vec!["hr.attendance.view".into()]));
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(t.clone())));

        let actor = service(users, tenants).authenticate(&token).await.unwrap();
        assert_eq!(actor.user_id, u.id);
        assert!(actor.can("hr.attendance.view"));
        assert!(!actor.can("crm.leads.view"));
    }
}
