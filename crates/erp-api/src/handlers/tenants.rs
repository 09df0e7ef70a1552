// ============================================================================
// ERP API - Tenant Handlers
// File: crates/erp-api/src/handlers/tenants.rs
// ============================================================================
//! Super-admin tenant management

use axum::extract::{Path, Query, State};
use erp_core::services::tenant_service::{CreateTenantInput, UpdateTenantInput};
use erp_core::Tenant;
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::SearchQuery;
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/tenants
pub async fn list(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Page<Tenant>> {
    let pagination = query.pagination();
    Ok(ok(state.services.tenants.list(&ctx, query.search, pagination).await?))
}

/// GET /api/v1/tenants/{id}
pub async fn get(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Tenant> {
    Ok(ok(state.services.tenants.get(&ctx, &id).await?))
}

/// POST /api/v1/tenants
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateTenantInput>,
) -> ApiCreated<Tenant> {
    Ok(created(state.services.tenants.create(&ctx, input).await?))
}

/// PUT /api/v1/tenants/{id}
pub async fn update(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateTenantInput>,
) -> ApiResult<Tenant> {
    Ok(ok(state.services.tenants.update(&ctx, &id, input).await?))
}

/// POST /api/v1/tenants/{id}/activate
pub async fn activate(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Tenant> {
    Ok(ok(state.services.tenants.set_active(&ctx, &id, true).await?))
}

/// POST /api/v1/tenants/{id}/suspend
pub async fn suspend(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Tenant> {
    Ok(ok(state.services.tenants.set_active(&ctx, &id, false).await?))
}

/// DELETE /api/v1/tenants/{id}
pub async fn delete(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.tenants.delete(&ctx, &id).await?;
    Ok(done())
}
