// ============================================================================
// ERP API - CRM Handlers
// File: crates/erp-api/src/handlers/crm.rs
// ============================================================================
//! Leads and deals

use axum::extract::{Path, Query, State};
use erp_core::services::deal_service::{DealInput, StageChangeInput};
use erp_core::services::lead_service::{ConvertLeadInput, LeadInput};
use erp_core::services::ConversionResult;
use erp_core::{Deal, Lead};
use erp_shared::Page;
use uuid::Uuid;

use crate::dto::{AssignLeadRequest, DealQuery, LeadQuery, LeadStatusRequest};
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

/// GET /api/v1/leads
pub async fn list_leads(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<LeadQuery>,
) -> ApiResult<Page<Lead>> {
    let (filter, pagination) = query.split();
    Ok(ok(state.services.leads.list(&ctx, filter, pagination).await?))
}

/// GET /api/v1/leads/{id}
pub async fn get_lead(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Lead> {
    Ok(ok(state.services.leads.get(&ctx, &id).await?))
}

/// POST /api/v1/leads
pub async fn create_lead(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<LeadInput>,
) -> ApiCreated<Lead> {
    Ok(created(state.services.leads.create(&ctx, input).await?))
}

/// PUT /api/v1/leads/{id}
pub async fn update_lead(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<LeadInput>,
) -> ApiResult<Lead> {
    Ok(ok(state.services.leads.update(&ctx, &id, input).await?))
}

/// POST /api/v1/leads/{id}/status
pub async fn change_lead_status(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<LeadStatusRequest>,
) -> ApiResult<Lead> {
    Ok(ok(state.services.leads.change_status(&ctx, &id, input.status).await?))
}

/// POST /api/v1/leads/{id}/assign
pub async fn assign_lead(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<AssignLeadRequest>,
) -> ApiResult<Lead> {
    Ok(ok(state.services.leads.assign(&ctx, &id, input.owner_id).await?))
}

/// POST /api/v1/leads/{id}/convert
pub async fn convert_lead(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<ConvertLeadInput>,
) -> ApiCreated<ConversionResult> {
    Ok(created(state.services.leads.convert(&ctx, &id, input).await?))
}

/// DELETE /api/v1/leads/{id}
pub async fn delete_lead(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.leads.delete(&ctx, &id).await?;
    Ok(done())
}

/// GET /api/v1/deals
pub async fn list_deals(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<DealQuery>,
) -> ApiResult<Page<Deal>> {
    let (filter, pagination) = query.split();
    Ok(ok(state.services.deals.list(&ctx, filter, pagination).await?))
}

/// GET /api/v1/deals/{id}
pub async fn get_deal(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Deal> {
    Ok(ok(state.services.deals.get(&ctx, &id).await?))
}

/// POST /api/v1/deals
pub async fn create_deal(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<DealInput>,
) -> ApiCreated<Deal> {
    Ok(created(state.services.deals.create(&ctx, input).await?))
}

/// PUT /api/v1/deals/{id}
pub async fn update_deal(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<DealInput>,
) -> ApiResult<Deal> {
    Ok(ok(state.services.deals.update(&ctx, &id, input).await?))
}

/// POST /api/v1/deals/{id}/stage
pub async fn change_deal_stage(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<StageChangeInput>,
) -> ApiResult<Deal> {
    Ok(ok(state.services.deals.change_stage(&ctx, &id, input).await?))
}

/// DELETE /api/v1/deals/{id}
pub async fn delete_deal(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.deals.delete(&ctx, &id).await?;
    Ok(done())
}
