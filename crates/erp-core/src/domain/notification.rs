//! Database-channel notification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Dotted kind, e.g. `lead.assigned`.
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: Option<Uuid>,
        user_id: Uuid,
        kind: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            kind: kind.into(),
            title: title.into(),
            body: body.into(),
            data,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}
