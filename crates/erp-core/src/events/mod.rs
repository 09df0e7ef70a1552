//! Domain events and their listeners
//!
//! Services build a [`DomainEvent`] after every successful write and hand it
//! to the [`EventDispatcher`]. Listeners cover the audit trail, database
//! notifications, webhook fan-out and workflows.

pub mod audit_listener;
pub mod dispatcher;
pub mod event;
pub mod notification_listener;
pub mod webhook;

pub use audit_listener::AuditListener;
pub use dispatcher::{EventDispatcher, EventListener};
pub use event::{DomainEvent, EventName};
pub use notification_listener::NotificationListener;
pub use webhook::{WebhookDeliverer, WebhookListener, WebhookRequest, WebhookResponse, WebhookSender};

#[cfg(any(test, feature = "mocks"))]
pub use webhook::MockWebhookSender;
