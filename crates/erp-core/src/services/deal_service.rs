//! CRM deals: CRUD and pipeline stage changes

use std::sync::Arc;

use chrono::NaiveDate;
use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{Deal, DealStage};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{DealFilter, DealRepository};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DealInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(range(min = 0))]
    pub value: Option<i64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    /// Overrides the stage default.
    #[validate(range(min = 0, max = 100))]
    pub probability: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StageChangeInput {
    pub stage: DealStage,
    #[validate(length(max = 500))]
    pub lost_reason: Option<String>,
}

pub struct DealService {
    deals: Arc<dyn DealRepository>,
    events: EventDispatcher,
}

impl DealService {
    pub fn new(deals: Arc<dyn DealRepository>, events: EventDispatcher) -> Self {
        Self { deals, events }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: DealFilter, pagination: Pagination) -> Result<Page<Deal>, DomainError> {
        ResourcePolicy::DEALS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.deals.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Deal, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: DealInput) -> Result<Deal, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::DEALS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let title = non_blank(input.title.clone())
            .ok_or_else(|| DomainError::ValidationError("title is required".into()))?;
        let currency = input.currency.clone().unwrap_or_else(|| "USD".to_string());
        let mut deal = Deal::new(tenant_id, title, currency, ctx.actor_id());
        Self::apply(&mut deal, input);

        let deal = self.deals.create(&deal).await?;
        info!(tenant_id = %tenant_id, deal_id = %deal.id, "Deal created");
        self.events
            .dispatch(self.event(ctx, EventName::DealCreated, &deal).with_new(&deal))
            .await;
        Ok(deal)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: DealInput) -> Result<Deal, DomainError> {
        input.validate()?;
        let mut deal = self.load(ctx, id, Ability::Update).await?;
        deal.ensure_open()?;
        let before = deal.clone();

        if let Some(title) = non_blank(input.title.clone()) {
            deal.title = title;
        }
        if let Some(currency) = &input.currency {
            deal.currency = currency.to_uppercase();
        }
        Self::apply(&mut deal, input);
        deal.touch(ctx.actor_id());

        let deal = self.deals.update(&deal).await?;
        self.events
            .dispatch(self.event(ctx, EventName::DealUpdated, &deal).with_old(&before).with_new(&deal))
            .await;
        Ok(deal)
    }

    pub async fn change_stage(&self, ctx: &RequestContext, id: &Uuid, input: StageChangeInput) -> Result<Deal, DomainError> {
        input.validate()?;
        let mut deal = self.load(ctx, id, Ability::Update).await?;
        let before = deal.clone();
        if before.stage == input.stage {
            return Ok(deal);
        }
        deal.move_to(input.stage, input.lost_reason)?;
        deal.touch(ctx.actor_id());

        let deal = self.deals.update(&deal).await?;
        info!(deal_id = %deal.id, from = %before.stage, to = %deal.stage, "Deal stage changed");
        self.events
            .dispatch(self.event(ctx, EventName::DealStageChanged, &deal).with_old(&before).with_new(&deal))
            .await;
        match deal.stage {
            DealStage::Won => {
                self.events
                    .dispatch(self.event(ctx, EventName::DealWon, &deal).with_new(&deal))
                    .await
            }
            DealStage::Lost => {
                self.events
                    .dispatch(self.event(ctx, EventName::DealLost, &deal).with_new(&deal))
                    .await
            }
            _ => {}
        }
        Ok(deal)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let deal = self.load(ctx, id, Ability::Delete).await?;
        self.deals.delete(&deal.id).await?;
        info!(deal_id = %deal.id, "Deal deleted");
        self.events
            .dispatch(self.event(ctx, EventName::DealDeleted, &deal).with_old(&deal))
            .await;
        Ok(())
    }

    fn apply(deal: &mut Deal, input: DealInput) {
        if input.contact_name.is_some() {
            deal.contact_name = non_blank(input.contact_name);
        }
        if input.contact_email.is_some() {
            deal.contact_email = non_blank(input.contact_email).map(|e| e.to_lowercase());
        }
        if input.company.is_some() {
            deal.company = non_blank(input.company);
        }
        if let Some(value) = input.value {
            deal.value = value;
        }
        if input.expected_close_date.is_some() {
            deal.expected_close_date = input.expected_close_date;
        }
        if input.owner_id.is_some() {
            deal.owner_id = input.owner_id;
        }
        if let Some(probability) = input.probability {
            deal.probability = probability;
        }
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Deal, DomainError> {
        let deal = found(self.deals.find_by_id(&ctx.scope, id).await?, "Deal", id)?;
        ResourcePolicy::DEALS.authorize(&ctx.actor, ability, Some(deal.tenant_id))?;
        Ok(deal)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, deal: &Deal) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(deal.tenant_id), "Deal", deal.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::events::EventListener;
    use crate::repositories::MockDealRepository;
    use crate::tenancy::TenantScope;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl EventListener for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
            self.0.lock().unwrap().push(event.name.as_str());
            Ok(())
        }
    }

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["crm.deals.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    #[tokio::test]
    async fn test_winning_emits_stage_and_won_events() {
        let tenant = Uuid::new_v4();
        let deal = Deal::new(tenant, "Fleet renewal".into(), "IDR".into(), None);
        let mut repo = MockDealRepository::new();
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(deal.clone())));
        repo.expect_update().returning(|d| Ok(d.clone()));

        let names = Arc::new(Mutex::new(Vec::new()));
        let events = EventDispatcher::new(vec![Arc::new(Recorder(names.clone()))]);
        let svc = DealService::new(Arc::new(repo), events);

        let won = svc
            .change_stage(&ctx(tenant), &Uuid::new_v4(), StageChangeInput { stage: DealStage::Won, lost_reason: None })
            .await
            .unwrap();

        assert_eq!(won.probability, 100);
        assert!(won.closed_at.is_some());
        assert_eq!(*names.lock().unwrap(), vec!["deal.stage_changed", "deal.won"]);
    }

    #[tokio::test]
    async fn test_lost_requires_reason() {
        let tenant = Uuid::new_v4();
        let deal = Deal::new(tenant, "Fleet renewal".into(), "IDR".into(), None);
        let mut repo = MockDealRepository::new();
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(deal.clone())));
        repo.expect_update().never();

        let svc = DealService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc
            .change_stage(&ctx(tenant), &Uuid::new_v4(), StageChangeInput { stage: DealStage::Lost, lost_reason: None })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_closed_deal_cannot_be_edited() {
        let tenant = Uuid::new_v4();
        let mut deal = Deal::new(tenant, "Fleet renewal".into(), "IDR".into(), None);
        deal.move_to(DealStage::Won, None).unwrap();
        let mut repo = MockDealRepository::new();
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(deal.clone())));

        let svc = DealService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc.update(&ctx(tenant), &Uuid::new_v4(), DealInput::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
