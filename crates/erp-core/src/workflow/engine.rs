// ============================================================================
// ERP Core - Workflow Engine
// File: crates/erp-core/src/workflow/engine.rs
// Description: Runs active workflows whose trigger matches a domain event
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use erp_shared::constants::WEBHOOK_EVENT_HEADER;
use handlebars::Handlebars;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::conditions::evaluate_all;
use crate::context::RequestContext;
use crate::domain::{Lead, LeadStatus, Notification, Workflow, WorkflowAction};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventListener, EventName, WebhookRequest, WebhookSender};
use crate::repositories::{LeadRepository, NotificationRepository, WorkflowRepository};
use crate::tenancy::TenantScope;

/// Renders `{{field}}` placeholders against the payload. Output is not HTML-escaped.
pub fn render_template(template: &str, payload: &Value) -> Result<String, DomainError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .render_template(template, payload)
        .map_err(|e| DomainError::ValidationError(format!("invalid template: {}", e)))
}

pub struct WorkflowListener {
    workflows: Arc<dyn WorkflowRepository>,
    leads: Arc<dyn LeadRepository>,
    notifications: Arc<dyn NotificationRepository>,
    sender: Arc<dyn WebhookSender>,
    /// Receives the events raised by workflow actions. Never holds a workflow
    /// listener, so workflow changes cannot re-trigger workflows.
    follow_up: EventDispatcher,
}

impl WorkflowListener {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        leads: Arc<dyn LeadRepository>,
        notifications: Arc<dyn NotificationRepository>,
        sender: Arc<dyn WebhookSender>,
        follow_up: EventDispatcher,
    ) -> Self {
        Self {
            workflows,
            leads,
            notifications,
            sender,
            follow_up,
        }
    }

    /// Dispatcher for `listeners` plus a workflow listener whose follow-up
    /// events reach `listeners` only.
    pub fn dispatcher(
        listeners: Vec<Arc<dyn EventListener>>,
        workflows: Arc<dyn WorkflowRepository>,
        leads: Arc<dyn LeadRepository>,
        notifications: Arc<dyn NotificationRepository>,
        sender: Arc<dyn WebhookSender>,
    ) -> EventDispatcher {
        let follow_up = EventDispatcher::new(listeners.clone());
        let mut all = listeners;
        all.push(Arc::new(Self::new(workflows, leads, notifications, sender, follow_up)));
        EventDispatcher::new(all)
    }

    /// Returns whether the conditions matched. A failing action does not stop
    /// the remaining ones.
    pub async fn run(&self, workflow: &Workflow, event: &DomainEvent) -> Result<bool, DomainError> {
        if !evaluate_all(&workflow.conditions, event.payload()) {
            debug!(workflow_id = %workflow.id, event = %event.name, "Workflow conditions not met");
            return Ok(false);
        }

        info!(workflow_id = %workflow.id, name = %workflow.name, event = %event.name, "Running workflow");
        for action in &workflow.actions {
            if let Err(e) = self.execute(workflow, action, event).await {
                error!(
                    workflow_id = %workflow.id,
                    action = action.kind(),
                    "Workflow action failed: {}",
                    e
                );
            }
        }

        self.workflows.record_run(&workflow.id, Utc::now()).await?;
        Ok(true)
    }

    async fn execute(&self, workflow: &Workflow, action: &WorkflowAction, event: &DomainEvent) -> Result<(), DomainError> {
        match action {
            WorkflowAction::NotifyUser { user_id, title, body } => {
                let payload = event.payload();
                let notification = Notification::new(
                    Some(workflow.tenant_id),
                    *user_id,
                    "workflow",
                    render_template(title, payload)?,
                    render_template(body, payload)?,
                    json!({
                        "workflow_id": workflow.id,
                        "event": event.name.as_str(),
                        "entity_id": event.entity_id,
                    }),
                );
                self.notifications.create(&notification).await
            }
            WorkflowAction::AssignLead { user_id } => {
                let mut lead = self.load_lead(workflow, event).await?;
                let before = lead.clone();
                if lead.assign(Some(*user_id)) {
                    lead.touch(None);
                    let lead = self.leads.update(&lead).await?;
                    self.emit(EventName::LeadAssigned, &before, &lead).await;
                }
                Ok(())
            }
            WorkflowAction::SetLeadStatus { status } => {
                let next = LeadStatus::from_str(status)
                    .ok_or_else(|| DomainError::ValidationError(format!("unknown lead status {}", status)))?;
                let mut lead = self.load_lead(workflow, event).await?;
                let before = lead.clone();
                if lead.status != next {
                    lead.change_status(next)?;
                    lead.touch(None);
                    let lead = self.leads.update(&lead).await?;
                    self.emit(EventName::LeadUpdated, &before, &lead).await;
                }
                Ok(())
            }
            WorkflowAction::CallWebhook { url } => {
                let request = WebhookRequest {
                    url: url.clone(),
                    headers: vec![
                        ("Content-Type".to_string(), "application/json".to_string()),
                        (WEBHOOK_EVENT_HEADER.to_string(), event.name.as_str().to_string()),
                    ],
                    body: event.webhook_body().to_string().into_bytes(),
                };
                let response = self.sender.send(request).await?;
                if !response.is_success() {
                    return Err(DomainError::ExternalServiceError(format!(
                        "workflow webhook returned HTTP {}",
                        response.status
                    )));
                }
                Ok(())
            }
        }
    }

    async fn load_lead(&self, workflow: &Workflow, event: &DomainEvent) -> Result<Lead, DomainError> {
        let lead_id = self.lead_id(event)?;
        let scope = TenantScope::Tenant(workflow.tenant_id);
        self.leads
            .find_by_id(&scope, &lead_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Lead", lead_id))
    }

    /// Lead changes made by a workflow are attributed to the system actor.
    async fn emit(&self, name: EventName, before: &Lead, after: &Lead) {
        let ctx = RequestContext::system(TenantScope::Tenant(after.tenant_id));
        self.follow_up
            .dispatch(
                DomainEvent::from_context(&ctx, name, Some(after.tenant_id), "Lead", after.id)
                    .with_old(before)
                    .with_new(after),
            )
            .await;
    }

    fn lead_id(&self, event: &DomainEvent) -> Result<Uuid, DomainError> {
        match (event.entity_type, event.entity_id) {
            ("Lead", Some(id)) => Ok(id),
            _ => Err(DomainError::ValidationError(format!(
                "lead actions need a lead event, got {}",
                event.name
            ))),
        }
    }
}

#[async_trait]
impl EventListener for WorkflowListener {
    fn name(&self) -> &'static str {
        "workflows"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
        let Some(tenant_id) = event.tenant_id else {
            return Ok(());
        };

        let workflows = self
            .workflows
            .list_active_for_trigger(&tenant_id, event.name.as_str())
            .await?;

        for workflow in &workflows {
            if let Err(e) = self.run(workflow, event).await {
                warn!(workflow_id = %workflow.id, "Workflow run failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Condition, ConditionOperator, Lead};
    use crate::domain::AuditLog;
    use crate::events::{AuditListener, MockWebhookSender, NotificationListener, WebhookResponse};
    use crate::repositories::{
        MockAuditLogRepository, MockLeadRepository, MockNotificationRepository, MockWorkflowRepository,
    };

    fn workflow(tenant_id: Uuid, conditions: Vec<Condition>, actions: Vec<WorkflowAction>) -> Workflow {
        Workflow::new(tenant_id, "Auto".into(), "lead.created".into(), conditions, actions, None).unwrap()
    }

    fn lead_event(lead: &Lead) -> DomainEvent {
        DomainEvent::new(EventName::LeadCreated, "Lead", Some(lead.id))
            .with_tenant(lead.tenant_id)
            .with_new(lead)
    }

    #[test]
    fn test_render_template() {
        let out = render_template("New lead {{name}} <{{email}}>", &json!({"name": "Acme & Co", "email": "a@b.io"})).unwrap();
        assert_eq!(out, "New lead Acme & Co <a@b.io>");
        assert!(render_template("{{#if}}", &json!({})).is_err());
    }

    #[tokio::test]
    async fn test_matching_workflow_runs_actions() {
        let tenant = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut lead = Lead::new(tenant, "Acme".into(), None);
        lead.estimated_value = 500_000;
        let stored = lead.clone();

        let mut leads = MockLeadRepository::new();
        leads
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(stored.clone())));
        leads
            .expect_update()
            .withf(move |l: &Lead| l.owner_id == Some(owner))
            .times(1)
            .returning(|l| Ok(l.clone()));

        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_create()
            .withf(|n: &Notification| n.title == "Big lead Acme")
            .times(1)
            .returning(|_| Ok(()));

        let mut workflows = MockWorkflowRepository::new();
        workflows.expect_record_run().times(1).returning(|_, _| Ok(()));

        let listener = WorkflowListener::new(
            Arc::new(workflows),
            Arc::new(leads),
            Arc::new(notifications),
            Arc::new(MockWebhookSender::new()),
            EventDispatcher::default(),
        );

        let wf = workflow(
            tenant,
            vec![Condition {
                field: "estimated_value".into(),
                operator: ConditionOperator::Gte,
                value: json!(100_000),
            }],
            vec![
                WorkflowAction::AssignLead { user_id: owner },
                WorkflowAction::NotifyUser {
                    user_id: owner,
                    title: "Big lead {{name}}".into(),
                    body: "Worth {{estimated_value}}".into(),
                },
            ],
        );

        assert!(listener.run(&wf, &lead_event(&lead)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unmatched_conditions_do_not_count_as_run() {
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Small".into(), None);

        let mut workflows = MockWorkflowRepository::new();
        workflows.expect_record_run().never();

        let listener = WorkflowListener::new(
            Arc::new(workflows),
            Arc::new(MockLeadRepository::new()),
            Arc::new(MockNotificationRepository::new()),
            Arc::new(MockWebhookSender::new()),
            EventDispatcher::default(),
        );
        let wf = workflow(
            tenant,
            vec![Condition {
                field: "estimated_value".into(),
                operator: ConditionOperator::Gt,
                value: json!(1),
            }],
            vec![WorkflowAction::SetLeadStatus { status: "contacted".into() }],
        );

        assert!(!listener.run(&wf, &lead_event(&lead)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_action_does_not_stop_the_rest() {
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Acme".into(), None);

        let mut sender = MockWebhookSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Ok(WebhookResponse { status: 503, body: String::new() }));

        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().times(1).returning(|_| Ok(()));

        let mut workflows = MockWorkflowRepository::new();
        workflows.expect_record_run().times(1).returning(|_, _| Ok(()));

        let listener = WorkflowListener::new(
            Arc::new(workflows),
            Arc::new(MockLeadRepository::new()),
            Arc::new(notifications),
            Arc::new(sender),
            EventDispatcher::default(),
        );
        let wf = workflow(
            tenant,
            vec![],
            vec![
                WorkflowAction::CallWebhook { url: "https://example.com/hook".into() },
                WorkflowAction::NotifyUser {
                    user_id: Uuid::new_v4(),
                    title: "t".into(),
                    body: "b".into(),
                },
            ],
        );

        assert!(listener.run(&wf, &lead_event(&lead)).await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_loads_workflows_for_trigger() {
        let tenant = Uuid::new_v4();
        let mut workflows = MockWorkflowRepository::new();
        workflows
            .expect_list_active_for_trigger()
            .withf(move |t: &Uuid, trigger: &str| *t == tenant && trigger == "deal.won")
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let listener = WorkflowListener::new(
            Arc::new(workflows),
            Arc::new(MockLeadRepository::new()),
            Arc::new(MockNotificationRepository::new()),
            Arc::new(MockWebhookSender::new()),
            EventDispatcher::default(),
        );
        let event = DomainEvent::new(EventName::DealWon, "Deal", None).with_tenant(tenant);
        listener.handle(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_workflow_assignment_notifies_owner_and_is_audited() {
        let tenant = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let lead = Lead::new(tenant, "Acme".into(), Some(Uuid::new_v4()));
        let lead_id = lead.id;
        let stored = lead.clone();

        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        leads.expect_update().times(1).returning(|l| Ok(l.clone()));

        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_create()
            .withf(move |n: &Notification| n.user_id == owner && n.kind == "lead.assigned")
            .times(1)
            .returning(|_| Ok(()));
        let mut audit = MockAuditLogRepository::new();
        audit
            .expect_create()
            .withf(move |log: &AuditLog| {
                log.event == "lead.assigned" && log.auditable_id == Some(lead_id) && log.user_id.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));
        audit
            .expect_create()
            .withf(|log: &AuditLog| log.event == "lead.created")
            .times(1)
            .returning(|_| Ok(()));

        let wf = workflow(tenant, vec![], vec![WorkflowAction::AssignLead { user_id: owner }]);
        let mut workflows = MockWorkflowRepository::new();
        // Only the original trigger is looked up; the follow-up event does not loop back.
        workflows
            .expect_list_active_for_trigger()
            .withf(|_: &Uuid, trigger: &str| trigger == "lead.created")
            .times(1)
            .returning(move |_, _| Ok(vec![wf.clone()]));
        workflows.expect_record_run().times(1).returning(|_, _| Ok(()));

        let dispatcher = WorkflowListener::dispatcher(
            vec![
                Arc::new(AuditListener::new(Arc::new(audit))),
                Arc::new(NotificationListener::new(Arc::new(notifications))),
            ],
            Arc::new(workflows),
            Arc::new(leads),
            Arc::new(MockNotificationRepository::new()),
            Arc::new(MockWebhookSender::new()),
        );
        assert_eq!(dispatcher.listener_count(), 3);

        let mut created = lead_event(&lead);
        created.actor_id = lead.created_by;
        dispatcher.dispatch(created).await;
    }

    #[tokio::test]
    async fn test_workflow_status_change_raises_lead_updated() {
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Acme".into(), None);
        let stored = lead.clone();

        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        leads
            .expect_update()
            .withf(|l: &Lead| l.status == LeadStatus::Contacted)
            .times(1)
            .returning(|l| Ok(l.clone()));
        let mut audit = MockAuditLogRepository::new();
        audit
            .expect_create()
            .withf(|log: &AuditLog| log.event == "lead.updated" && log.new_values.is_some())
            .times(1)
            .returning(|_| Ok(()));
        let mut workflows = MockWorkflowRepository::new();
        workflows.expect_record_run().times(1).returning(|_, _| Ok(()));

        let listener = WorkflowListener::new(
            Arc::new(workflows),
            Arc::new(leads),
            Arc::new(MockNotificationRepository::new()),
            Arc::new(MockWebhookSender::new()),
            EventDispatcher::new(vec![Arc::new(AuditListener::new(Arc::new(audit)))]),
        );
        let wf = workflow(tenant, vec![], vec![WorkflowAction::SetLeadStatus { status: "contacted".into() }]);

        assert!(listener.run(&wf, &lead_event(&lead)).await.unwrap());
    }
}
