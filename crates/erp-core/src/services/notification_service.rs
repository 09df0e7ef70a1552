//! The caller's own in-app notifications

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::domain::Notification;
use crate::error::DomainError;
use crate::repositories::NotificationRepository;

pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    pub async fn list(&self, ctx: &RequestContext, unread_only: bool, pagination: Pagination) -> Result<Page<Notification>, DomainError> {
        self.notifications
            .list_for_user(&ctx.actor.user_id, unread_only, pagination)
            .await
    }

    pub async fn unread_count(&self, ctx: &RequestContext) -> Result<i64, DomainError> {
        self.notifications.unread_count(&ctx.actor.user_id).await
    }

    /// Notifications of other users look missing.
    pub async fn mark_read(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        if self.notifications.mark_read(&ctx.actor.user_id, id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Notification", id))
        }
    }

    pub async fn mark_all_read(&self, ctx: &RequestContext) -> Result<u64, DomainError> {
        self.notifications.mark_all_read(&ctx.actor.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::MockNotificationRepository;
    use crate::tenancy::TenantScope;

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification() {
        let user = Uuid::new_v4();
        let ctx = RequestContext::new(
            Actor::new(user, None, false, vec![]),
            TenantScope::All,
            RequestMeta::default(),
        );
        let mut repo = MockNotificationRepository::new();
        repo.expect_mark_read()
            .withf(move |u, _| *u == user)
            .returning(|_, _| Ok(false));

        let svc = NotificationService::new(Arc::new(repo));
        assert!(matches!(
            svc.mark_read(&ctx, &Uuid::new_v4()).await,
            Err(DomainError::NotFound { entity: "Notification", .. })
        ));
    }
}
