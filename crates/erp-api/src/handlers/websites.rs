// ============================================================================
// ERP API - Website Handlers
// File: crates/erp-api/src/handlers/websites.rs
// ============================================================================
//! Sites, pages and the public page endpoint

use axum::extract::{Path, Query, State};
use erp_core::services::website_service::{CreatePageInput, CreateSiteInput, UpdatePageInput, UpdateSiteInput};
use erp_core::{WebsitePage, WebsiteSite};
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::PageQuery;
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/websites
pub async fn list_sites(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<WebsiteSite>> {
    Ok(ok(state.services.websites.list_sites(&ctx, query.pagination()).await?))
}

/// GET /api/v1/websites/{id}
pub async fn get_site(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebsiteSite> {
    Ok(ok(state.services.websites.get_site(&ctx, &id).await?))
}

/// POST /api/v1/websites
pub async fn create_site(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateSiteInput>,
) -> ApiCreated<WebsiteSite> {
    Ok(created(state.services.websites.create_site(&ctx, input).await?))
}

/// PUT /api/v1/websites/{id}
pub async fn update_site(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateSiteInput>,
) -> ApiResult<WebsiteSite> {
    Ok(ok(state.services.websites.update_site(&ctx, &id, input).await?))
}

/// DELETE /api/v1/websites/{id}
pub async fn delete_site(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.websites.delete_site(&ctx, &id).await?;
    Ok(done())
}

/// GET /api/v1/websites/{id}/pages
pub async fn list_pages(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(site_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<WebsitePage>> {
    Ok(ok(state.services.websites.list_pages(&ctx, &site_id, query.pagination()).await?))
}

/// POST /api/v1/websites/{id}/pages
pub async fn create_page(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(site_id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<CreatePageInput>,
) -> ApiCreated<WebsitePage> {
    Ok(created(state.services.websites.create_page(&ctx, &site_id, input).await?))
}

/// GET /api/v1/pages/{id}
pub async fn get_page(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebsitePage> {
    Ok(ok(state.services.websites.get_page(&ctx, &id).await?))
}

/// PUT /api/v1/pages/{id}
pub async fn update_page(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdatePageInput>,
) -> ApiResult<WebsitePage> {
    Ok(ok(state.services.websites.update_page(&ctx, &id, input).await?))
}

/// DELETE /api/v1/pages/{id}
pub async fn delete_page(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.websites.delete_page(&ctx, &id).await?;
    Ok(done())
}

/// POST /api/v1/pages/{id}/publish
pub async fn publish_page(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebsitePage> {
    Ok(ok(state.services.websites.publish_page(&ctx, &id).await?))
}

/// POST /api/v1/pages/{id}/unpublish
pub async fn unpublish_page(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<WebsitePage> {
    Ok(ok(state.services.websites.unpublish_page(&ctx, &id).await?))
}

/// Public page - GET /api/v1/public/sites/{domain}/pages/{slug}
pub async fn public_page(
    State(state): State<AppState>,
    Path((domain, slug)): Path<(String, String)>,
) -> ApiResult<WebsitePage> {
    Ok(ok(state.services.websites.public_page(&domain, &slug).await?))
}
