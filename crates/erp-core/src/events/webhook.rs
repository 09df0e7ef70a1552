// ============================================================================
// ERP Core - Webhook Fan-out
// File: crates/erp-core/src/events/webhook.rs
// Description: Signed outbound delivery of domain events with retries
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use erp_shared::constants::{WEBHOOK_EVENT_HEADER, WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::dispatcher::EventListener;
use super::event::DomainEvent;
use crate::domain::{WebhookDelivery, WebhookEndpoint};
use crate::error::DomainError;
use crate::repositories::WebhookRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP port. Transport failures are `ExternalServiceError`.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, DomainError>;
}

/// Response bodies are truncated before they are stored.
const MAX_STORED_RESPONSE: usize = 2_000;

#[derive(Clone)]
pub struct WebhookDeliverer {
    sender: Arc<dyn WebhookSender>,
    repo: Arc<dyn WebhookRepository>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl WebhookDeliverer {
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        repo: Arc<dyn WebhookRepository>,
        max_attempts: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            sender,
            repo,
            max_attempts: max_attempts.max(1),
            backoff_base: Duration::from_millis(backoff_base_ms),
        }
    }

    pub fn build_request(endpoint: &WebhookEndpoint, event_name: &str, body: &Value) -> WebhookRequest {
        let body = body.to_string().into_bytes();
        let timestamp = Utc::now().timestamp();
        let signature = erp_security::signature::sign_payload(&endpoint.secret, timestamp, &body);
        WebhookRequest {
            url: endpoint.url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (WEBHOOK_EVENT_HEADER.to_string(), event_name.to_string()),
                (WEBHOOK_TIMESTAMP_HEADER.to_string(), timestamp.to_string()),
                (WEBHOOK_SIGNATURE_HEADER.to_string(), signature),
            ],
            body,
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Tries up to `max_attempts` times and records every attempt.
    /// Returns the last delivery.
    pub async fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        event_id: Uuid,
        event_name: &str,
        body: &Value,
        max_attempts: Option<u32>,
    ) -> WebhookDelivery {
        let attempts = max_attempts.unwrap_or(self.max_attempts).max(1);
        let mut attempt = 1;
        loop {
            let delivery = self.attempt(endpoint, event_id, event_name, body, attempt).await;
            if let Err(e) = self.repo.record_delivery(&delivery).await {
                warn!(endpoint_id = %endpoint.id, "Failed to record webhook delivery: {}", e);
            }

            if delivery.success {
                info!(endpoint_id = %endpoint.id, event = event_name, attempt, "Webhook delivered");
                return delivery;
            }
            if attempt >= attempts {
                warn!(
                    endpoint_id = %endpoint.id,
                    event = event_name,
                    attempt,
                    "Webhook delivery gave up"
                );
                return delivery;
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        endpoint: &WebhookEndpoint,
        event_id: Uuid,
        event_name: &str,
        body: &Value,
        attempt: u32,
    ) -> WebhookDelivery {
        let request = Self::build_request(endpoint, event_name, body);
        let started = Instant::now();
        let result = self.sender.send(request).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let (response_status, response_body, error, success) = match result {
            Ok(response) => {
                let success = response.is_success();
                let mut text = response.body;
                if text.len() > MAX_STORED_RESPONSE {
                    let mut cut = MAX_STORED_RESPONSE;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    text.truncate(cut);
                }
                let error = (!success).then(|| format!("endpoint returned HTTP {}", response.status));
                (Some(response.status as i32), Some(text), error, success)
            }
            Err(e) => (None, None, Some(e.to_string()), false),
        };

        WebhookDelivery {
            id: Uuid::new_v4(),
            tenant_id: endpoint.tenant_id,
            endpoint_id: endpoint.id,
            event_id,
            event: event_name.to_string(),
            attempt: attempt as i32,
            request_body: body.clone(),
            response_status,
            response_body,
            error,
            success,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

/// Spawns one delivery task per subscribed endpoint.
pub struct WebhookListener {
    repo: Arc<dyn WebhookRepository>,
    deliverer: WebhookDeliverer,
}

impl WebhookListener {
    pub fn new(repo: Arc<dyn WebhookRepository>, deliverer: WebhookDeliverer) -> Self {
        Self { repo, deliverer }
    }
}

#[async_trait]
impl EventListener for WebhookListener {
    fn name(&self) -> &'static str {
        "webhooks"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
        let Some(tenant_id) = event.tenant_id else {
            return Ok(());
        };

        let endpoints = self.repo.list_active_for_tenant(&tenant_id).await?;
        let body = event.webhook_body();
        for endpoint in endpoints
            .into_iter()
            .filter(|e| e.subscribes_to(event.name.as_str()))
        {
            let deliverer = self.deliverer.clone();
            let body = body.clone();
            let event_id = event.id;
            let event_name = event.name.as_str();
            tokio::spawn(async move {
                deliverer.deliver(&endpoint, event_id, event_name, &body, None).await;
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockWebhookRepository;
    use serde_json::json;

    fn endpoint() -> WebhookEndpoint {
        WebhookEndpoint::new(
            Uuid::new_v4(),
            "https://hooks.example.com/in".into(),
            vec!["*".into()],
            "whsec_test".into(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_request_is_signed() {
        let ep = endpoint();
        let body = json!({"event": "deal.won"});
        let req = WebhookDeliverer::build_request(&ep, "deal.won", &body);

        let header = |name: &str| {
            req.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        let timestamp: i64 = header(WEBHOOK_TIMESTAMP_HEADER).parse().unwrap();
        assert_eq!(header(WEBHOOK_EVENT_HEADER), "deal.won");
        assert!(erp_security::signature::verify_payload(
            "whsec_test",
            timestamp,
            &req.body,
            &header(WEBHOOK_SIGNATURE_HEADER)
        ));
    }

    #[test]
    fn test_backoff_doubles() {
        let deliverer = WebhookDeliverer::new(
            Arc::new(MockWebhookSender::new()),
            Arc::new(MockWebhookRepository::new()),
            3,
            100,
        );
        assert_eq!(deliverer.backoff(1), Duration::from_millis(100));
        assert_eq!(deliverer.backoff(2), Duration::from_millis(200));
        assert_eq!(deliverer.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut sender = MockWebhookSender::new();
        let mut seq = mockall::Sequence::new();
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(WebhookResponse { status: 500, body: "oops".into() }));
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(WebhookResponse { status: 204, body: String::new() }));

        let mut repo = MockWebhookRepository::new();
        repo.expect_record_delivery().times(2).returning(|_| Ok(()));

        let deliverer = WebhookDeliverer::new(Arc::new(sender), Arc::new(repo), 3, 0);
        let delivery = deliverer
            .deliver(&endpoint(), Uuid::new_v4(), "lead.created", &json!({}), None)
            .await;

        assert!(delivery.success);
        assert_eq!(delivery.attempt, 2);
        assert_eq!(delivery.response_status, Some(204));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut sender = MockWebhookSender::new();
        sender
            .expect_send()
            .times(2)
            .returning(|_| Err(DomainError::ExternalServiceError("connection refused".into())));
        let mut repo = MockWebhookRepository::new();
        repo.expect_record_delivery().times(2).returning(|_| Ok(()));

        let deliverer = WebhookDeliverer::new(Arc::new(sender), Arc::new(repo), 2, 0);
        let delivery = deliverer
            .deliver(&endpoint(), Uuid::new_v4(), "lead.created", &json!({}), None)
            .await;

        assert!(!delivery.success);
        assert_eq!(delivery.attempt, 2);
        assert!(delivery.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_listener_ignores_tenantless_events() {
        let mut repo = MockWebhookRepository::new();
        repo.expect_list_active_for_tenant().never();
        let repo: Arc<dyn WebhookRepository> = Arc::new(repo);
        let deliverer = WebhookDeliverer::new(Arc::new(MockWebhookSender::new()), repo.clone(), 1, 0);
        let listener = WebhookListener::new(repo, deliverer);

        let event = DomainEvent::new(crate::events::EventName::TenantCreated, "Tenant", None);
        listener.handle(&event).await.unwrap();
    }
}
