use axum::extract::{Query, State};
use erp_core::AuditLog;
use erp_shared::Page;

use crate::dto::AuditQuery;
use crate::error::ApiResult;
use crate::extract::Auth;
use crate::response::ok;
use crate::state::AppState;

/// GET /api/v1/audit-logs
pub async fn list(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Page<AuditLog>> {
    let (filter, pagination) = query.split();
    Ok(ok(state.services.audit.list(&ctx, filter, pagination).await?))
}
