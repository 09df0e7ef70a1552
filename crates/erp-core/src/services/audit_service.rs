//! Read access to the audit trail

use std::sync::Arc;

use erp_shared::{Page, Pagination};

use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::AuditLog;
use crate::error::DomainError;
use crate::repositories::{AuditLogFilter, AuditLogRepository};

pub struct AuditService {
    logs: Arc<dyn AuditLogRepository>,
}

impl AuditService {
    pub fn new(logs: Arc<dyn AuditLogRepository>) -> Self {
        Self { logs }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: AuditLogFilter, pagination: Pagination) -> Result<Page<AuditLog>, DomainError> {
        ResourcePolicy::AUDIT.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.logs.list(&ctx.scope, filter, pagination).await
    }
}
