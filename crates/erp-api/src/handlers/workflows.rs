// ============================================================================
// ERP API - Workflow Handlers
// File: crates/erp-api/src/handlers/workflows.rs
// ============================================================================

use axum::extract::{Path, Query, State};
use erp_core::services::workflow_service::{CreateWorkflowInput, UpdateWorkflowInput};
use erp_core::Workflow;
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::PageQuery;
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/workflows
pub async fn list(State(state): State<AppState>, Auth(ctx): Auth, Query(query): Query<PageQuery>) -> ApiResult<Page<Workflow>> {
    Ok(ok(state.services.workflows.list(&ctx, query.pagination()).await?))
}

/// GET /api/v1/workflows/{id}
pub async fn get(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Workflow> {
    Ok(ok(state.services.workflows.get(&ctx, &id).await?))
}

/// POST /api/v1/workflows
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateWorkflowInput>,
) -> ApiCreated<Workflow> {
    Ok(created(state.services.workflows.create(&ctx, input).await?))
}

/// PUT /api/v1/workflows/{id}
pub async fn update(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateWorkflowInput>,
) -> ApiResult<Workflow> {
    Ok(ok(state.services.workflows.update(&ctx, &id, input).await?))
}

/// POST /api/v1/workflows/{id}/activate
pub async fn activate(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Workflow> {
    Ok(ok(state.services.workflows.activate(&ctx, &id).await?))
}

/// POST /api/v1/workflows/{id}/deactivate
pub async fn deactivate(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Workflow> {
    Ok(ok(state.services.workflows.deactivate(&ctx, &id).await?))
}

/// DELETE /api/v1/workflows/{id}
pub async fn delete(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.workflows.delete(&ctx, &id).await?;
    Ok(done())
}
