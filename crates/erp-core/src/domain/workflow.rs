// ============================================================================
// ERP Core - Workflow Entity
// File: crates/erp-core/src/domain/workflow.rs
// Description: Trigger / condition / action automation rules
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    IsEmpty,
    IsNotEmpty,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "eq",
            ConditionOperator::Ne => "ne",
            ConditionOperator::Gt => "gt",
            ConditionOperator::Gte => "gte",
            ConditionOperator::Lt => "lt",
            ConditionOperator::Lte => "lte",
            ConditionOperator::Contains => "contains",
            ConditionOperator::In => "in",
            ConditionOperator::IsEmpty => "is_empty",
            ConditionOperator::IsNotEmpty => "is_not_empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot path into the event payload, e.g. `owner_id` or `items.0.sku`.
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    NotifyUser {
        user_id: Uuid,
        title: String,
        body: String,
    },
    AssignLead {
        user_id: Uuid,
    },
    SetLeadStatus {
        status: String,
    },
    CallWebhook {
        url: String,
    },
}

impl WorkflowAction {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowAction::NotifyUser { .. } => "notify_user",
            WorkflowAction::AssignLead { .. } => "assign_lead",
            WorkflowAction::SetLeadStatus { .. } => "set_lead_status",
            WorkflowAction::CallWebhook { .. } => "call_webhook",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    pub description: Option<String>,

    /// Event name such as `lead.created`.
    pub trigger: String,

    pub conditions: Vec<Condition>,

    #[validate(length(min = 1))]
    pub actions: Vec<WorkflowAction>,

    pub is_active: bool,
    pub run_count: i64,
    pub last_run_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Workflow {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        trigger: String,
        conditions: Vec<Condition>,
        actions: Vec<WorkflowAction>,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let workflow = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            description: None,
            trigger,
            conditions,
            actions,
            is_active: true,
            run_count: 0,
            last_run_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_json_shape() {
        let action: WorkflowAction = serde_json::from_value(json!({
            "type": "notify_user",
            "user_id": "00000000-0000-0000-0000-000000000001",
            "title": "New lead {{name}}",
            "body": "from {{source}}"
        }))
        .unwrap();
        assert_eq!(action.kind(), "notify_user");

        let value = serde_json::to_value(WorkflowAction::SetLeadStatus { status: "contacted".into() }).unwrap();
        assert_eq!(value, json!({"type": "set_lead_status", "status": "contacted"}));
    }

    #[test]
    fn test_condition_value_defaults_to_null() {
        let c: Condition = serde_json::from_value(json!({"field": "email", "operator": "is_empty"})).unwrap();
        assert_eq!(c.operator, ConditionOperator::IsEmpty);
        assert!(c.value.is_null());
    }

    #[test]
    fn test_requires_action() {
        assert!(Workflow::new(Uuid::nil(), "W".into(), "lead.created".into(), vec![], vec![], None).is_err());
    }
}
