//! Writes the audit trail from domain events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::dispatcher::EventListener;
use super::event::DomainEvent;
use crate::domain::audit_log::{diff_values, strip_noise};
use crate::domain::AuditLog;
use crate::error::DomainError;
use crate::repositories::AuditLogRepository;

pub struct AuditListener {
    repo: Arc<dyn AuditLogRepository>,
}

impl AuditListener {
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self { repo }
    }

    /// Updates keep only the changed keys on both sides.
    pub fn build_log(event: &DomainEvent) -> AuditLog {
        let mut old = event.old.clone();
        let mut new = event.new.clone();
        if let Some(v) = old.as_mut() {
            strip_noise(v);
        }
        if let Some(v) = new.as_mut() {
            strip_noise(v);
        }
        if let (Some(o), Some(n)) = (&old, &new) {
            let (o, n) = diff_values(o, n);
            old = Some(o);
            new = Some(n);
        }

        AuditLog {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            user_id: event.actor_id,
            action: event.name.verb().to_string(),
            auditable_type: event.entity_type.to_string(),
            auditable_id: event.entity_id,
            event: event.name.as_str().to_string(),
            old_values: old,
            new_values: new,
            ip_address: event.meta.ip_address.clone(),
            user_agent: event.meta.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl EventListener for AuditListener {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
        self.repo.create(&Self::build_log(event)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestMeta;
    use crate::events::EventName;
    use crate::repositories::MockAuditLogRepository;
    use serde_json::json;

    #[test]
    fn test_update_keeps_changed_keys_only() {
        let mut event = DomainEvent::new(EventName::LeadUpdated, "Lead", Some(Uuid::new_v4()))
            .with_old(&json!({"name": "A", "status": "new", "modified_at": null}))
            .with_new(&json!({"name": "A", "status": "qualified", "modified_at": "2024-01-01T00:00:00Z"}));
        event.meta = RequestMeta {
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("curl".into()),
        };

        let log = AuditListener::build_log(&event);
        assert_eq!(log.action, "updated");
        assert_eq!(log.old_values, Some(json!({"status": "new"})));
        assert_eq!(log.new_values, Some(json!({"status": "qualified"})));
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_create_keeps_full_payload() {
        let event = DomainEvent::new(EventName::ProductCreated, "Product", None).with_new(&json!({"sku": "A"}));
        let log = AuditListener::build_log(&event);
        assert_eq!(log.action, "created");
        assert!(log.old_values.is_none());
        assert_eq!(log.new_values, Some(json!({"sku": "A"})));
    }

    #[tokio::test]
    async fn test_handle_writes_log() {
        let mut repo = MockAuditLogRepository::new();
        repo.expect_create()
            .withf(|log: &AuditLog| log.event == "deal.won" && log.auditable_type == "Deal")
            .times(1)
            .returning(|_| Ok(()));

        let listener = AuditListener::new(Arc::new(repo));
        listener
            .handle(&DomainEvent::new(EventName::DealWon, "Deal", None))
            .await
            .unwrap();
    }
}
