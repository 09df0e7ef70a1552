// ============================================================================
// ERP API - User Handlers
// File: crates/erp-api/src/handlers/users.rs
// ============================================================================

use axum::extract::{Path, Query, State};
use erp_core::services::user_service::{CreateUserInput, UpdateUserInput, UserWithRoles};
use erp_core::User;
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::{AssignRolesRequest, SearchQuery};
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/users
pub async fn list(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Page<User>> {
    let page = state
        .services
        .users
        .list(&ctx, query.user_filter(), query.pagination())
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/users/{id}
pub async fn get(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<UserWithRoles> {
    Ok(ok(state.services.users.get(&ctx, &id).await?))
}

/// POST /api/v1/users
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateUserInput>,
) -> ApiCreated<User> {
    Ok(created(state.services.users.create(&ctx, input).await?))
}

/// PUT /api/v1/users/{id}
pub async fn update(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateUserInput>,
) -> ApiResult<User> {
    Ok(ok(state.services.users.update(&ctx, &id, input).await?))
}

/// PUT /api/v1/users/{id}/roles
pub async fn assign_roles(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<AssignRolesRequest>,
) -> ApiResult<UserWithRoles> {
    Ok(ok(state.services.users.assign_roles(&ctx, &id, input.role_ids).await?))
}

/// DELETE /api/v1/users/{id}
pub async fn delete(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.users.delete(&ctx, &id).await?;
    Ok(done())
}
