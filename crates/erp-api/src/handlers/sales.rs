// ============================================================================
// ERP API - Sales Handlers
// File: crates/erp-api/src/handlers/sales.rs
// ============================================================================
//! Products, invoices and payments

use axum::extract::{Path, Query, State};
use erp_core::services::invoice_service::{CreateInvoiceInput, RecordPaymentInput, UpdateInvoiceInput};
use erp_core::services::product_service::{CreateProductInput, UpdateProductInput};
use erp_core::{Invoice, Payment, Product};
use erp_shared::Page;
use serde::Serialize;
use uuid::Uuid;

use crate::dto::{InvoiceQuery, SearchQuery};
use crate::error::{ApiCreated, ApiResult};
use crate::extract::{Auth, ValidatedJson};
use crate::response::{created, done, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentRecorded {
    pub invoice: Invoice,
    pub payment: Payment,
}

/// GET /api/v1/products
pub async fn list_products(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Page<Product>> {
    let page = state
        .services
        .products
        .list(&ctx, query.product_filter(), query.pagination())
        .await?;
    Ok(ok(page))
}

/// GET /api/v1/products/{id}
pub async fn get_product(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Product> {
    Ok(ok(state.services.products.get(&ctx, &id).await?))
}

/// POST /api/v1/products
pub async fn create_product(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateProductInput>,
) -> ApiCreated<Product> {
    Ok(created(state.services.products.create(&ctx, input).await?))
}

/// PUT /api/v1/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateProductInput>,
) -> ApiResult<Product> {
    Ok(ok(state.services.products.update(&ctx, &id, input).await?))
}

/// DELETE /api/v1/products/{id}
pub async fn delete_product(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.products.delete(&ctx, &id).await?;
    Ok(done())
}

/// GET /api/v1/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Page<Invoice>> {
    let (filter, pagination) = query.split();
    Ok(ok(state.services.invoices.list(&ctx, filter, pagination).await?))
}

/// GET /api/v1/invoices/{id}
pub async fn get_invoice(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Invoice> {
    Ok(ok(state.services.invoices.get(&ctx, &id).await?))
}

/// POST /api/v1/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<CreateInvoiceInput>,
) -> ApiCreated<Invoice> {
    Ok(created(state.services.invoices.create(&ctx, input).await?))
}

/// PUT /api/v1/invoices/{id}
pub async fn update_invoice(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateInvoiceInput>,
) -> ApiResult<Invoice> {
    Ok(ok(state.services.invoices.update(&ctx, &id, input).await?))
}

/// DELETE /api/v1/invoices/{id}
pub async fn delete_invoice(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.invoices.delete(&ctx, &id).await?;
    Ok(done())
}

/// POST /api/v1/invoices/{id}/issue
pub async fn issue_invoice(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Invoice> {
    Ok(ok(state.services.invoices.issue(&ctx, &id).await?))
}

/// POST /api/v1/invoices/{id}/void
pub async fn void_invoice(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Invoice> {
    Ok(ok(state.services.invoices.void(&ctx, &id).await?))
}

/// GET /api/v1/invoices/{id}/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Payment>> {
    Ok(ok(state.services.invoices.list_payments(&ctx, &id).await?))
}

/// POST /api/v1/invoices/{id}/payments
pub async fn record_payment(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<RecordPaymentInput>,
) -> ApiCreated<PaymentRecorded> {
    let (invoice, payment) = state.services.invoices.record_payment(&ctx, &id, input).await?;
    Ok(created(PaymentRecorded { invoice, payment }))
}

/// DELETE /api/v1/payments/{id}
///
/// Returns the invoice with its recomputed status.
pub async fn delete_payment(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<Invoice> {
    Ok(ok(state.services.invoices.delete_payment(&ctx, &id).await?))
}
