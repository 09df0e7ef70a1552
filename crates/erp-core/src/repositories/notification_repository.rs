//! Notification repository trait (port)

use async_trait::async_trait;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::Notification;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), DomainError>;
    async fn list_for_user(&self, user_id: &Uuid, unread_only: bool, pagination: Pagination) -> Result<Page<Notification>, DomainError>;
    async fn unread_count(&self, user_id: &Uuid) -> Result<i64, DomainError>;
    /// Returns false when the notification does not belong to the user.
    async fn mark_read(&self, user_id: &Uuid, id: &Uuid) -> Result<bool, DomainError>;
    async fn mark_all_read(&self, user_id: &Uuid) -> Result<u64, DomainError>;
}
