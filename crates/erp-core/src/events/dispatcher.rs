//! Synchronous fan-out of domain events to registered listeners.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::event::DomainEvent;
use crate::error::DomainError;

#[async_trait]
pub trait EventListener: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError>;
}

/// Listener failures are logged and never reach the caller.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    pub fn new(listeners: Vec<Arc<dyn EventListener>>) -> Self {
        Self {
            listeners: Arc::new(listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub async fn dispatch(&self, event: DomainEvent) {
        debug!(
            event = %event.name,
            entity_type = event.entity_type,
            entity_id = ?event.entity_id,
            tenant_id = ?event.tenant_id,
            "Dispatching domain event"
        );

        for listener in self.listeners.iter() {
            if let Err(e) = listener.handle(&event).await {
                error!(
                    listener = listener.name(),
                    event = %event.name,
                    entity_id = ?event.entity_id,
                    "Event listener failed: {}",
                    e
                );
            }
        }
    }
}
