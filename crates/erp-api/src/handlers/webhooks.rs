// ============================================================================
// ERP API - Webhook Handlers
// File: crates/erp-api/src/handlers/webhooks.rs
// ============================================================================

use axum::extract::{Path, Query, State};
use erp_core::services::webhook_service::{CreateWebhookInput, UpdateWebhookInput};
use erp_core::services::CreatedWebhook;
use erp_core::{WebhookDelivery, WebhookEndpoint};
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::PageQuery;
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/webhooks
pub async fn list(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<WebhookEndpoint>> {
    Ok(ok(state.services.webhooks.list(&ctx, query.pagination()).await?))
}

/// GET /api/v1/webhooks/{id}
pub async fn get(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebhookEndpoint> {
    Ok(ok(state.services.webhooks.get(&ctx, &id).await?))
}

/// POST /api/v1/webhooks
///
/// The signing secret is only returned here.
pub async fn create(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateWebhookInput>,
) -> ApiCreated<CreatedWebhook> {
    Ok(created(state.services.webhooks.create(&ctx, input).await?))
}

/// PUT /api/v1/webhooks/{id}
pub async fn update(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateWebhookInput>,
) -> ApiResult<WebhookEndpoint> {
    Ok(ok(state.services.webhooks.update(&ctx, &id, input).await?))
}

/// DELETE /api/v1/webhooks/{id}
pub async fn delete(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.webhooks.delete(&ctx, &id).await?;
    Ok(done())
}

/// GET /api/v1/webhooks/{id}/deliveries
pub async fn deliveries(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<WebhookDelivery>> {
    Ok(ok(state.services.webhooks.deliveries(&ctx, &id, query.pagination()).await?))
}

/// POST /api/v1/webhooks/{id}/test
pub async fn test(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebhookDelivery> {
    Ok(ok(state.services.webhooks.test(&ctx, &id).await?))
}
