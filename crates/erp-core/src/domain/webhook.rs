// ============================================================================
// ERP Core - Webhook Entities
// File: crates/erp-core/src/domain/webhook.rs
// Description: Outbound webhook endpoints and their delivery attempts
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(url)]
    pub url: String,

    #[validate(length(max = 200))]
    pub description: Option<String>,

    /// Event names, `*` for everything or `lead.*` for a family.
    #[validate(length(min = 1))]
    pub events: Vec<String>,

    #[serde(skip_serializing, default)]
    pub secret: String,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl WebhookEndpoint {
    pub fn new(
        tenant_id: Uuid,
        url: String,
        events: Vec<String>,
        secret: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let endpoint = Self {
            id: Uuid::new_v4(),
            tenant_id,
            url: url.trim().to_string(),
            description: None,
            events,
            secret,
            is_active: true,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| {
            e == "*"
                || e == event
                || e
                    .strip_suffix(".*")
                    .is_some_and(|prefix| event.starts_with(prefix) && event[prefix.len()..].starts_with('.'))
        })
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

/// One HTTP attempt to deliver an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event: String,
    pub attempt: i32,
    pub request_body: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub success: bool,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(events: &[&str]) -> WebhookEndpoint {
        WebhookEndpoint::new(
            Uuid::nil(),
            "https://hooks.example.com/erp".into(),
            events.iter().map(|e| e.to_string()).collect(),
            "whsec_x".into(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_subscriptions() {
        assert!(endpoint(&["*"]).subscribes_to("deal.won"));
        assert!(endpoint(&["deal.won"]).subscribes_to("deal.won"));
        assert!(!endpoint(&["deal.won"]).subscribes_to("deal.lost"));
        assert!(endpoint(&["lead.*"]).subscribes_to("lead.converted"));
        assert!(!endpoint(&["lead.*"]).subscribes_to("leads.created"));
    }

    #[test]
    fn test_invalid_url_and_empty_events() {
        assert!(WebhookEndpoint::new(Uuid::nil(), "not a url".into(), vec!["*".into()], "s".into(), None).is_err());
        assert!(WebhookEndpoint::new(Uuid::nil(), "https://a.io".into(), vec![], "s".into(), None).is_err());
    }
}
