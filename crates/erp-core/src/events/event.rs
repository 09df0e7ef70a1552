// ============================================================================
// ERP Core - Domain Events
// File: crates/erp-core/src/events/event.rs
// Description: Event names and the event envelope passed to listeners
// ============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{RequestContext, RequestMeta};

macro_rules! event_names {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventName {
            $($variant),+
        }

        impl EventName {
            pub const ALL: &'static [EventName] = &[$(EventName::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(EventName::$variant => $name),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $($name => Some(EventName::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

event_names! {
    TenantCreated => "tenant.created",
    TenantUpdated => "tenant.updated",
    TenantDeleted => "tenant.deleted",
    UserCreated => "user.created",
    UserUpdated => "user.updated",
    UserDeleted => "user.deleted",
    UserLoggedIn => "user.logged_in",
    RoleCreated => "role.created",
    RoleUpdated => "role.updated",
    RoleDeleted => "role.deleted",
    LeadCreated => "lead.created",
    LeadUpdated => "lead.updated",
    LeadDeleted => "lead.deleted",
    LeadAssigned => "lead.assigned",
    LeadConverted => "lead.converted",
    DealCreated => "deal.created",
    DealUpdated => "deal.updated",
    DealDeleted => "deal.deleted",
    DealStageChanged => "deal.stage_changed",
    DealWon => "deal.won",
    DealLost => "deal.lost",
    ProductCreated => "product.created",
    ProductUpdated => "product.updated",
    ProductDeleted => "product.deleted",
    InvoiceCreated => "invoice.created",
    InvoiceUpdated => "invoice.updated",
    InvoiceDeleted => "invoice.deleted",
    InvoiceIssued => "invoice.issued",
    InvoiceVoided => "invoice.voided",
    InvoiceOverdue => "invoice.overdue",
    InvoicePaid => "invoice.paid",
    PaymentRecorded => "payment.recorded",
    PaymentDeleted => "payment.deleted",
    EmployeeCreated => "employee.created",
    EmployeeUpdated => "employee.updated",
    EmployeeDeleted => "employee.deleted",
    AttendanceCreated => "attendance.created",
    AttendanceUpdated => "attendance.updated",
    AttendanceSynced => "attendance.synced",
    SiteCreated => "website.created",
    SiteUpdated => "website.updated",
    SiteDeleted => "website.deleted",
    PageCreated => "page.created",
    PageUpdated => "page.updated",
    PageDeleted => "page.deleted",
    PagePublished => "page.published",
    PageUnpublished => "page.unpublished",
    WebhookCreated => "webhook.created",
    WebhookUpdated => "webhook.updated",
    WebhookDeleted => "webhook.deleted",
    WebhookPing => "webhook.ping",
    WorkflowCreated => "workflow.created",
    WorkflowUpdated => "workflow.updated",
    WorkflowDeleted => "workflow.deleted",
}

impl EventName {
    /// Last segment of the name, e.g. `created` for `lead.created`.
    pub fn verb(&self) -> &'static str {
        let name = self.as_str();
        name.rsplit('.').next().unwrap_or(name)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: EventName,
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip)]
    pub meta: RequestMeta,
}

impl DomainEvent {
    pub fn new(name: EventName, entity_type: &'static str, entity_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            tenant_id: None,
            actor_id: None,
            entity_type,
            entity_id,
            old: None,
            new: None,
            occurred_at: Utc::now(),
            meta: RequestMeta::default(),
        }
    }

    /// Event attributed to the caller in `ctx`.
    pub fn from_context(
        ctx: &RequestContext,
        name: EventName,
        tenant_id: Option<Uuid>,
        entity_type: &'static str,
        entity_id: Uuid,
    ) -> Self {
        let mut event = Self::new(name, entity_type, Some(entity_id));
        event.tenant_id = tenant_id;
        event.actor_id = ctx.actor_id();
        event.meta = ctx.meta.clone();
        event
    }

    pub fn with_old<T: Serialize>(mut self, value: &T) -> Self {
        self.old = serde_json::to_value(value).ok();
        self
    }

    pub fn with_new<T: Serialize>(mut self, value: &T) -> Self {
        self.new = serde_json::to_value(value).ok();
        self
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Current state of the entity, or its last state for deletions.
    pub fn payload(&self) -> &Value {
        self.new.as_ref().or(self.old.as_ref()).unwrap_or(&Value::Null)
    }

    /// Reads a UUID field from the payload.
    pub fn payload_uuid(&self, field: &str) -> Option<Uuid> {
        self.payload()
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Body sent to webhook endpoints.
    pub fn webhook_body(&self) -> Value {
        json!({
            "id": self.id,
            "event": self.name.as_str(),
            "occurred_at": self.occurred_at,
            "tenant_id": self.tenant_id,
            "data": self.payload(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for name in EventName::ALL {
            assert_eq!(EventName::from_str(name.as_str()), Some(*name));
        }
        assert_eq!(EventName::from_str("nope"), None);
    }

    #[test]
    fn test_verb() {
        assert_eq!(EventName::LeadCreated.verb(), "created");
        assert_eq!(EventName::DealStageChanged.verb(), "stage_changed");
    }

    #[test]
    fn test_payload_prefers_new() {
        let event = DomainEvent::new(EventName::LeadUpdated, "Lead", None)
            .with_old(&json!({"owner_id": null}))
            .with_new(&json!({"owner_id": "00000000-0000-0000-0000-000000000007"}));
        assert_eq!(event.payload_uuid("owner_id"), Some(Uuid::from_u128(7)));

        let deleted = DomainEvent::new(EventName::LeadDeleted, "Lead", None).with_old(&json!({"name": "A"}));
        assert_eq!(deleted.payload()["name"], "A");
    }

    #[test]
    fn test_webhook_body_shape() {
        let tenant = Uuid::new_v4();
        let event = DomainEvent::new(EventName::DealWon, "Deal", None)
            .with_tenant(tenant)
            .with_new(&json!({"title": "Big"}));
        let body = event.webhook_body();
        assert_eq!(body["event"], "deal.won");
        assert_eq!(body["tenant_id"], json!(tenant));
        assert_eq!(body["data"]["title"], "Big");
    }
}
