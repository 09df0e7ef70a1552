use axum::extract::{Path, Query, State};
use erp_core::Notification;
use erp_shared::Page;
use serde::Serialize;
use uuid::Uuid;

use crate::dto::{NotificationQuery, PageQuery};
use crate::error::ApiResult;
use crate::extract::Auth;
use crate::response::{done, ok};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /api/v1/notifications?unread=true
pub async fn list(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Page<Notification>> {
    let pagination = PageQuery { page: query.page, per_page: query.per_page }.pagination();
    Ok(ok(state.services.notifications.list(&ctx, query.unread, pagination).await?))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>, Auth(ctx): Auth) -> ApiResult<UnreadCount> {
    let count = state.services.notifications.unread_count(&ctx).await?;
    Ok(ok(UnreadCount { count }))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_read(State(state): State<AppState>, Auth(ctx): Auth, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.notifications.mark_read(&ctx, &id).await?;
    Ok(done())
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, Auth(ctx): Auth) -> ApiResult<MarkedRead> {
    let updated = state.services.notifications.mark_all_read(&ctx).await?;
    Ok(ok(MarkedRead { updated }))
}
