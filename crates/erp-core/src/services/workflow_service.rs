//! Workflow definitions: CRUD and activation

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{Condition, LeadStatus, Workflow, WorkflowAction};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::WorkflowRepository;
use crate::workflow::render_template;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkflowInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub trigger: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[validate(length(min = 1))]
    pub actions: Vec<WorkflowAction>,
    #[serde(default = "active_default")]
    pub is_active: bool,
}

fn active_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWorkflowInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger: Option<String>,
    pub conditions: Option<Vec<Condition>>,
    #[validate(length(min = 1))]
    pub actions: Option<Vec<WorkflowAction>>,
}

pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    events: EventDispatcher,
}

impl WorkflowService {
    pub fn new(workflows: Arc<dyn WorkflowRepository>, events: EventDispatcher) -> Self {
        Self { workflows, events }
    }

    /// Lead actions need a lead trigger; templates must parse.
    pub fn validate_definition(trigger: &str, actions: &[WorkflowAction]) -> Result<(), DomainError> {
        if EventName::from_str(trigger).is_none() {
            return Err(DomainError::ValidationError(format!("unknown trigger {}", trigger)));
        }
        let lead_trigger = trigger.starts_with("lead.");
        for action in actions {
            match action {
                WorkflowAction::NotifyUser { title, body, .. } => {
                    render_template(title, &Value::Null)?;
                    render_template(body, &Value::Null)?;
                }
                WorkflowAction::AssignLead { .. } if !lead_trigger => {
                    return Err(DomainError::ValidationError(
                        "assign_lead requires a lead trigger".into(),
                    ));
                }
                WorkflowAction::SetLeadStatus { status } => {
                    if !lead_trigger {
                        return Err(DomainError::ValidationError(
                            "set_lead_status requires a lead trigger".into(),
                        ));
                    }
                    match LeadStatus::from_str(status) {
                        Some(LeadStatus::Converted) | None => {
                            return Err(DomainError::ValidationError(format!(
                                "invalid lead status {}",
                                status
                            )))
                        }
                        Some(_) => {}
                    }
                }
                WorkflowAction::CallWebhook { url } => {
                    if !(url.starts_with("http://") || url.starts_with("https://")) {
                        return Err(DomainError::ValidationError(format!("invalid webhook url {}", url)));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub async fn list(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Page<Workflow>, DomainError> {
        ResourcePolicy::WORKFLOWS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.workflows.list(&ctx.scope, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Workflow, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateWorkflowInput) -> Result<Workflow, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::WORKFLOWS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;
        Self::validate_definition(&input.trigger, &input.actions)?;

        let mut workflow = Workflow::new(
            tenant_id,
            input.name,
            input.trigger,
            input.conditions,
            input.actions,
            ctx.actor_id(),
        )?;
        workflow.description = non_blank(input.description);
        workflow.is_active = input.is_active;

        let workflow = self.workflows.create(&workflow).await?;
        info!(tenant_id = %tenant_id, trigger = %workflow.trigger, "Workflow created");
        self.events
            .dispatch(self.event(ctx, EventName::WorkflowCreated, &workflow).with_new(&workflow))
            .await;
        Ok(workflow)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateWorkflowInput) -> Result<Workflow, DomainError> {
        input.validate()?;
        let mut workflow = self.load(ctx, id, Ability::Update).await?;
        let before = workflow.clone();

        if let Some(name) = non_blank(input.name) {
            workflow.name = name;
        }
        if input.description.is_some() {
            workflow.description = non_blank(input.description);
        }
        if let Some(trigger) = input.trigger {
            workflow.trigger = trigger;
        }
        if let Some(conditions) = input.conditions {
            workflow.conditions = conditions;
        }
        if let Some(actions) = input.actions {
            workflow.actions = actions;
        }
        Self::validate_definition(&workflow.trigger, &workflow.actions)?;
        workflow.touch(ctx.actor_id());
        workflow.validate()?;

        self.save(ctx, EventName::WorkflowUpdated, &before, workflow).await
    }

    pub async fn activate(&self, ctx: &RequestContext, id: &Uuid) -> Result<Workflow, DomainError> {
        self.set_active(ctx, id, true).await
    }

    pub async fn deactivate(&self, ctx: &RequestContext, id: &Uuid) -> Result<Workflow, DomainError> {
        self.set_active(ctx, id, false).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let workflow = self.load(ctx, id, Ability::Delete).await?;
        self.workflows.delete(&workflow.id).await?;
        info!(workflow_id = %workflow.id, "Workflow deleted");
        self.events
            .dispatch(self.event(ctx, EventName::WorkflowDeleted, &workflow).with_old(&workflow))
            .await;
        Ok(())
    }

    async fn set_active(&self, ctx: &RequestContext, id: &Uuid, active: bool) -> Result<Workflow, DomainError> {
        let mut workflow = self.load(ctx, id, Ability::Update).await?;
        if workflow.is_active == active {
            return Ok(workflow);
        }
        let before = workflow.clone();
        workflow.is_active = active;
        workflow.touch(ctx.actor_id());
        self.save(ctx, EventName::WorkflowUpdated, &before, workflow).await
    }

    async fn save(&self, ctx: &RequestContext, name: EventName, before: &Workflow, workflow: Workflow) -> Result<Workflow, DomainError> {
        let workflow = self.workflows.update(&workflow).await?;
        self.events
            .dispatch(self.event(ctx, name, &workflow).with_old(before).with_new(&workflow))
            .await;
        Ok(workflow)
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Workflow, DomainError> {
        let workflow = found(self.workflows.find_by_id(&ctx.scope, id).await?, "Workflow", id)?;
        ResourcePolicy::WORKFLOWS.authorize(&ctx.actor, ability, Some(workflow.tenant_id))?;
        Ok(workflow)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, workflow: &Workflow) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(workflow.tenant_id), "Workflow", workflow.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::MockWorkflowRepository;
    use crate::tenancy::TenantScope;

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["core.workflows.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    #[test]
    fn test_definition_rules() {
        let assign = vec![WorkflowAction::AssignLead { user_id: Uuid::new_v4() }];
        assert!(WorkflowService::validate_definition("lead.created", &assign).is_ok());
        assert!(WorkflowService::validate_definition("deal.won", &assign).is_err());
        assert!(WorkflowService::validate_definition("lead.exploded", &assign).is_err());

        let convert = vec![WorkflowAction::SetLeadStatus { status: "converted".into() }];
        assert!(WorkflowService::validate_definition("lead.created", &convert).is_err());

        let bad_template = vec![WorkflowAction::NotifyUser {
            user_id: Uuid::new_v4(),
            title: "{{#if}}".into(),
            body: "x".into(),
        }];
        assert!(WorkflowService::validate_definition("deal.won", &bad_template).is_err());
    }

    #[tokio::test]
    async fn test_deactivate() {
        let tenant = Uuid::new_v4();
        let workflow = Workflow::new(
            tenant,
            "Welcome".into(),
            "lead.created".into(),
            vec![],
            vec![WorkflowAction::CallWebhook { url: "https://example.com".into() }],
            None,
        )
        .unwrap();
        let mut repo = MockWorkflowRepository::new();
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(workflow.clone())));
        repo.expect_update()
            .withf(|w| !w.is_active)
            .times(1)
            .returning(|w| Ok(w.clone()));

        let svc = WorkflowService::new(Arc::new(repo), EventDispatcher::default());
        let workflow = svc.deactivate(&ctx(tenant), &Uuid::new_v4()).await.unwrap();
        assert!(!workflow.is_active);
    }
}
