//! Stores database notifications for the events users care about.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::dispatcher::EventListener;
use super::event::{DomainEvent, EventName};
use crate::domain::Notification;
use crate::error::DomainError;
use crate::repositories::NotificationRepository;

pub struct NotificationListener {
    repo: Arc<dyn NotificationRepository>,
}

fn text(payload: &Value, field: &str) -> String {
    payload.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

impl NotificationListener {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Maps an event to its recipient and message. `None` when nobody is notified.
    pub fn build(event: &DomainEvent) -> Option<Notification> {
        let payload = event.payload();
        let (recipient, title, body) = match event.name {
            EventName::LeadAssigned => (
                event.payload_uuid("owner_id")?,
                "Lead assigned to you".to_string(),
                format!("You are now the owner of lead {}", text(payload, "name")),
            ),
            EventName::DealWon => (
                event.payload_uuid("owner_id")?,
                "Deal won".to_string(),
                format!("Deal {} was won", text(payload, "title")),
            ),
            EventName::DealLost => (
                event.payload_uuid("owner_id")?,
                "Deal lost".to_string(),
                format!(
                    "Deal {} was lost: {}",
                    text(payload, "title"),
                    text(payload, "lost_reason")
                ),
            ),
            EventName::InvoicePaid => (
                event.payload_uuid("created_by")?,
                "Invoice paid".to_string(),
                format!("Invoice {} has been paid in full", text(payload, "number")),
            ),
            _ => return None,
        };

        // Nobody needs to hear about their own action.
        if Some(recipient) == event.actor_id {
            return None;
        }

        Some(Notification::new(
            event.tenant_id,
            recipient,
            event.name.as_str(),
            title,
            body,
            json!({
                "entity_type": event.entity_type,
                "entity_id": event.entity_id,
            }),
        ))
    }
}

#[async_trait]
impl EventListener for NotificationListener {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
        match Self::build(event) {
            Some(notification) => self.repo.create(&notification).await,
            None => Ok(()),
        }
    }
}
