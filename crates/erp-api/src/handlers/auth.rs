// ============================================================================
// ERP API - Auth Handlers
// File: crates/erp-api/src/handlers/auth.rs
// ============================================================================
//! Authentication HTTP handlers (login, refresh, me, change password)

use axum::extract::State;
use erp_core::authorization::PermissionDef;
use erp_core::services::auth_service::{ChangePasswordInput, LoginInput};
use erp_core::services::{LoginResult, MeResult, RoleService};
use erp_security::TokenPair;
use tracing::warn;

use crate::dto::RefreshRequest;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Auth, ClientMeta, ValidatedJson};
use crate::response::ok;
use crate::state::AppState;

/// Login handler - POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    ValidatedJson(input): ValidatedJson<LoginInput>,
) -> ApiResult<LoginResult> {
    let key = meta.ip_address.clone().unwrap_or_else(|| "unknown".to_string());
    if !state.login_limiter.check(&key) {
        warn!(ip = %key, "Login rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }
    let result = state.services.auth.login(input, meta).await?;
    Ok(ok(result))
}

/// Refresh token handler - POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    Ok(ok(state.services.auth.refresh(&input.refresh_token).await?))
}

/// Current user - GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, Auth(ctx): Auth) -> ApiResult<MeResult> {
    Ok(ok(state.services.auth.me(&ctx).await?))
}

/// Change password - POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<ChangePasswordInput>,
) -> ApiResult<()> {
    state.services.auth.change_password(&ctx, input).await?;
    Ok(crate::response::done())
}

/// Permission catalog - GET /api/v1/permissions
pub async fn permissions(Auth(_ctx): Auth) -> ApiResult<&'static [PermissionDef]> {
    Ok(ok(RoleService::catalog()))
}
