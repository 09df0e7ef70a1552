// ============================================================================
// ERP API - Auth Middleware
// File: crates/erp-api/src/middleware/auth.rs
// Description: Bearer authentication and tenant selection
// ============================================================================

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use erp_core::{RequestContext, TenantScope};
use erp_shared::constants::TENANT_HEADER;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::request_meta;
use crate::state::AppState;

/// Resolves the bearer token into a [`RequestContext`] stored in request
/// extensions. Super admins may pick a tenant with `X-Tenant-ID`; the picked
/// tenant must be active.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let actor = state.services.auth.authenticate(token).await?;
    let requested = tenant_header(request.headers())?;
    let scope = TenantScope::for_actor(&actor, requested)?;

    // The user's own tenant was already checked while authenticating.
    if requested.is_some() {
        if let Some(tenant_id) = scope.tenant_id() {
            state.services.auth.ensure_tenant_active(&tenant_id).await?;
        }
    }

    let meta = request_meta(request.headers(), request.extensions(), state.trust_proxy_headers);
    debug!(user_id = %actor.user_id, scope = ?scope, "Request authenticated");

    request
        .extensions_mut()
        .insert(RequestContext::new(actor, scope, meta));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn tenant_header(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    match headers.get(TENANT_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be a UUID", TENANT_HEADER))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("bearer   xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_tenant_header_must_be_uuid() {
        let mut headers = HeaderMap::new();
        assert!(matches!(tenant_header(&headers), Ok(None)));

        let id = Uuid::new_v4();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert!(matches!(tenant_header(&headers), Ok(Some(found)) if found == id));

        headers.insert(TENANT_HEADER, HeaderValue::from_static("acme"));
        assert!(matches!(tenant_header(&headers), Err(ApiError::BadRequest(_))));
    }
}
