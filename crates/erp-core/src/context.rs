//! Per-request context handed to every service call.

use serde::Serialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::error::DomainError;
use crate::tenancy::TenantScope;

/// Client metadata recorded in the audit trail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub scope: TenantScope,
    pub meta: RequestMeta,
}

impl RequestContext {
    pub fn new(actor: Actor, scope: TenantScope, meta: RequestMeta) -> Self {
        Self { actor, scope, meta }
    }

    pub fn system(scope: TenantScope) -> Self {
        Self {
            actor: Actor::system(),
            scope,
            meta: RequestMeta::default(),
        }
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.actor.actor_id()
    }

    pub fn require_tenant(&self) -> Result<Uuid, DomainError> {
        self.scope.require_tenant()
    }
}
