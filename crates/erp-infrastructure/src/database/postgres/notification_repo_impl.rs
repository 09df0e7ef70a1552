// ============================================================================
// ERP Infrastructure - PostgreSQL Notification Repository
// File: crates/erp-infrastructure/src/database/postgres/notification_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::Notification;
use erp_core::error::DomainError;
use erp_core::repositories::NotificationRepository;
use erp_shared::{Page, Pagination};

use super::db_error;

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    tenant_id: Option<Uuid>,
    user_id: Uuid,
    kind: String,
    title: String,
    body: String,
    data: Value,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            data: row.data,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, user_id, kind, title, body, data, read_at, created_at";

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO notifications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            COLUMNS
        ))
        .bind(notification.id)
        .bind(notification.tenant_id)
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create notification"))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &Uuid, unread_only: bool, pagination: Pagination) -> Result<Page<Notification>, DomainError> {
        let predicate = "user_id = $1 AND (NOT $2 OR read_at IS NULL)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications WHERE {}", predicate))
            .bind(user_id)
            .bind(unread_only)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count notifications"))?;

        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            COLUMNS, predicate
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list notifications"))?;

        Ok(Page::new(rows.into_iter().map(Notification::from).collect(), total, pagination))
    }

    async fn unread_count(&self, user_id: &Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count unread notifications"))
    }

    async fn mark_read(&self, user_id: &Uuid, id: &Uuid) -> Result<bool, DomainError> {
        // Already-read notifications still count as found.
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, NOW()) WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark notification read"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: &Uuid) -> Result<u64, DomainError> {
        let result = sqlx::query("UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("mark notifications read"))?;

        Ok(result.rows_affected())
    }
}
