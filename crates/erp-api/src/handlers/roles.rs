// ============================================================================
// ERP API - Role Handlers
// File: crates/erp-api/src/handlers/roles.rs
// ============================================================================

use axum::extract::{Path, Query, State};
use erp_core::services::role_service::{CreateRoleInput, UpdateRoleInput};
use erp_core::Role;
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::{PageQuery, PermissionsRequest};
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/roles
pub async fn list(State(state): State<AppState>, Auth(ctx): Auth, Query(query): Query<PageQuery>) -> ApiResult<Page<Role>> {
    Ok(ok(state.services.roles.list(&ctx, query.pagination()).await?))
}

/// GET /api/v1/roles/{id}
pub async fn get(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Role> {
    Ok(ok(state.services.roles.get(&ctx, &id).await?))
}

/// POST /api/v1/roles
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateRoleInput>,
) -> ApiCreated<Role> {
    Ok(created(state.services.roles.create(&ctx, input).await?))
}

/// PUT /api/v1/roles/{id}
pub async fn update(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateRoleInput>,
) -> ApiResult<Role> {
    Ok(ok(state.services.roles.update(&ctx, &id, input).await?))
}

/// PUT /api/v1/roles/{id}/permissions
pub async fn set_permissions(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<PermissionsRequest>,
) -> ApiResult<Role> {
    Ok(ok(state.services.roles.set_permissions(&ctx, &id, input.permissions).await?))
}

/// DELETE /api/v1/roles/{id}
pub async fn delete(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.roles.delete(&ctx, &id).await?;
    Ok(done())
}
