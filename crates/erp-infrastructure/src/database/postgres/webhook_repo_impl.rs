// ============================================================================
// ERP Infrastructure - PostgreSQL Webhook Repository
// File: crates/erp-infrastructure/src/database/postgres/webhook_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::{WebhookDelivery, WebhookEndpoint};
use erp_core::error::DomainError;
use erp_core::repositories::WebhookRepository;
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::db_error;

pub struct PgWebhookRepository {
    pool: PgPool,
}

impl PgWebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EndpointRow {
    id: Uuid,
    tenant_id: Uuid,
    url: String,
    description: Option<String>,
    events: Vec<String>,
    secret: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<EndpointRow> for WebhookEndpoint {
    fn from(row: EndpointRow) -> Self {
        WebhookEndpoint {
            id: row.id,
            tenant_id: row.tenant_id,
            url: row.url,
            description: row.description,
            events: row.events,
            secret: row.secret,
            is_active: row.is_active,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: Uuid,
    tenant_id: Uuid,
    endpoint_id: Uuid,
    event_id: Uuid,
    event: String,
    attempt: i32,
    request_body: Value,
    response_status: Option<i32>,
    response_body: Option<String>,
    error: Option<String>,
    success: bool,
    duration_ms: i64,
    created_at: DateTime<Utc>,
}

impl From<DeliveryRow> for WebhookDelivery {
    fn from(row: DeliveryRow) -> Self {
        WebhookDelivery {
            id: row.id,
            tenant_id: row.tenant_id,
            endpoint_id: row.endpoint_id,
            event_id: row.event_id,
            event: row.event,
            attempt: row.attempt,
            request_body: row.request_body,
            response_status: row.response_status,
            response_body: row.response_body,
            error: row.error,
            success: row.success,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, url, description, events, secret, is_active, \
    created_at, created_by, modified_at, modified_by";

const DELIVERY_COLUMNS: &str = "id, tenant_id, endpoint_id, event_id, event, attempt, request_body, \
    response_status, response_body, error, success, duration_ms, created_at";

#[async_trait]
impl WebhookRepository for PgWebhookRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<WebhookEndpoint>, DomainError> {
        let row: Option<EndpointRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_endpoints WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find webhook"))?;

        Ok(row.map(WebhookEndpoint::from))
    }

    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<WebhookEndpoint>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_endpoints WHERE ($1::uuid IS NULL OR tenant_id = $1)")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count webhooks"))?;

        let rows: Vec<EndpointRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM webhook_endpoints
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(scope.tenant_id())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list webhooks"))?;

        Ok(Page::new(rows.into_iter().map(WebhookEndpoint::from).collect(), total, pagination))
    }

    async fn list_active_for_tenant(&self, tenant_id: &Uuid) -> Result<Vec<WebhookEndpoint>, DomainError> {
        let rows: Vec<EndpointRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_endpoints WHERE tenant_id = $1 AND is_active",
            COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list active webhooks"))?;

        Ok(rows.into_iter().map(WebhookEndpoint::from).collect())
    }

    async fn create(&self, endpoint: &WebhookEndpoint) -> Result<WebhookEndpoint, DomainError> {
        let row: EndpointRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO webhook_endpoints (
                id, tenant_id, url, description, events, secret, is_active, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(endpoint.id)
        .bind(endpoint.tenant_id)
        .bind(&endpoint.url)
        .bind(&endpoint.description)
        .bind(&endpoint.events)
        .bind(&endpoint.secret)
        .bind(endpoint.is_active)
        .bind(endpoint.created_at)
        .bind(endpoint.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create webhook"))?;

        Ok(row.into())
    }

    async fn update(&self, endpoint: &WebhookEndpoint) -> Result<WebhookEndpoint, DomainError> {
        let row: Option<EndpointRow> = sqlx::query_as(&format!(
            r#"
            UPDATE webhook_endpoints SET
                url = $2, description = $3, events = $4, is_active = $5,
                modified_at = $6, modified_by = $7
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(endpoint.id)
        .bind(&endpoint.url)
        .bind(&endpoint.description)
        .bind(&endpoint.events)
        .bind(endpoint.is_active)
        .bind(endpoint.modified_at)
        .bind(endpoint.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update webhook"))?;

        row.map(WebhookEndpoint::from)
            .ok_or_else(|| DomainError::not_found("Webhook", endpoint.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM webhook_endpoints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete webhook"))?;
        Ok(())
    }

    async fn record_delivery(&self, delivery: &WebhookDelivery) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO webhook_deliveries ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            DELIVERY_COLUMNS
        ))
        .bind(delivery.id)
        .bind(delivery.tenant_id)
        .bind(delivery.endpoint_id)
        .bind(delivery.event_id)
        .bind(&delivery.event)
        .bind(delivery.attempt)
        .bind(&delivery.request_body)
        .bind(delivery.response_status)
        .bind(&delivery.response_body)
        .bind(&delivery.error)
        .bind(delivery.success)
        .bind(delivery.duration_ms)
        .bind(delivery.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("record webhook delivery"))?;
        Ok(())
    }

    async fn list_deliveries(&self, endpoint_id: &Uuid, pagination: Pagination) -> Result<Page<WebhookDelivery>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_deliveries WHERE endpoint_id = $1")
            .bind(endpoint_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count webhook deliveries"))?;

        let rows: Vec<DeliveryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_deliveries WHERE endpoint_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            DELIVERY_COLUMNS
        ))
        .bind(endpoint_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list webhook deliveries"))?;

        Ok(Page::new(rows.into_iter().map(WebhookDelivery::from).collect(), total, pagination))
    }
}
