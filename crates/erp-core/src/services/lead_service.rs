// ============================================================================
// ERP Core - Lead Service
// File: crates/erp-core/src/services/lead_service.rs
// ============================================================================
//! CRM leads: CRUD, status changes, assignment and conversion to deals

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{Deal, DealStage, Lead, LeadStatus};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{LeadFilter, LeadRepository, UserRepository};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LeadInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 100))]
    pub source: Option<String>,
    #[validate(range(min = 0))]
    pub estimated_value: Option<i64>,
    pub notes: Option<String>,
    pub owner_id: Option<Uuid>,
    pub status: Option<LeadStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ConvertLeadInput {
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub expected_close_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub lead: Lead,
    pub deal: Deal,
}

const DEFAULT_CURRENCY: &str = "USD";

pub struct LeadService {
    leads: Arc<dyn LeadRepository>,
    users: Arc<dyn UserRepository>,
    events: EventDispatcher,
}

impl LeadService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        users: Arc<dyn UserRepository>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            leads,
            users,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: LeadFilter, pagination: Pagination) -> Result<Page<Lead>, DomainError> {
        ResourcePolicy::LEADS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.leads.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Lead, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: LeadInput) -> Result<Lead, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::LEADS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let name = non_blank(input.name.clone())
            .ok_or_else(|| DomainError::ValidationError("name is required".into()))?;
        let mut lead = Lead::new(tenant_id, name, ctx.actor_id());
        Self::apply(&mut lead, input.clone());
        if let Some(status) = input.status {
            lead.change_status(status)?;
        }
        let owner = input.owner_id;
        if owner.is_some() {
            self.ensure_owner(tenant_id, owner).await?;
            lead.assign(owner);
        }
        lead.validate()?;

        let lead = self.leads.create(&lead).await?;
        info!(tenant_id = %tenant_id, lead_id = %lead.id, "Lead created");
        self.events
            .dispatch(self.event(ctx, EventName::LeadCreated, &lead).with_new(&lead))
            .await;
        if lead.owner_id.is_some() {
            self.events
                .dispatch(self.event(ctx, EventName::LeadAssigned, &lead).with_new(&lead))
                .await;
        }
        Ok(lead)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: LeadInput) -> Result<Lead, DomainError> {
        input.validate()?;
        let mut lead = self.load(ctx, id, Ability::Update).await?;
        lead.ensure_editable()?;
        let before = lead.clone();

        if let Some(name) = non_blank(input.name.clone()) {
            lead.name = name;
        }
        Self::apply(&mut lead, input.clone());
        if let Some(status) = input.status {
            lead.change_status(status)?;
        }
        let reassigned = match input.owner_id {
            Some(owner) => {
                self.ensure_owner(lead.tenant_id, Some(owner)).await?;
                lead.assign(Some(owner))
            }
            None => false,
        };
        lead.touch(ctx.actor_id());
        lead.validate()?;

        let lead = self.leads.update(&lead).await?;
        self.events
            .dispatch(self.event(ctx, EventName::LeadUpdated, &lead).with_old(&before).with_new(&lead))
            .await;
        if reassigned {
            self.events
                .dispatch(self.event(ctx, EventName::LeadAssigned, &lead).with_old(&before).with_new(&lead))
                .await;
        }
        Ok(lead)
    }

    pub async fn change_status(&self, ctx: &RequestContext, id: &Uuid, status: LeadStatus) -> Result<Lead, DomainError> {
        let mut lead = self.load(ctx, id, Ability::Update).await?;
        lead.ensure_editable()?;
        let before = lead.clone();
        lead.change_status(status)?;
        lead.touch(ctx.actor_id());

        let lead = self.leads.update(&lead).await?;
        self.events
            .dispatch(self.event(ctx, EventName::LeadUpdated, &lead).with_old(&before).with_new(&lead))
            .await;
        Ok(lead)
    }

    /// `None` clears the owner.
    pub async fn assign(&self, ctx: &RequestContext, id: &Uuid, owner_id: Option<Uuid>) -> Result<Lead, DomainError> {
        let mut lead = self.load(ctx, id, Ability::Update).await?;
        lead.ensure_editable()?;
        self.ensure_owner(lead.tenant_id, owner_id).await?;
        let before = lead.clone();
        if !lead.assign(owner_id) {
            return Ok(lead);
        }
        lead.touch(ctx.actor_id());

        let lead = self.leads.update(&lead).await?;
        info!(lead_id = %lead.id, owner_id = ?owner_id, "Lead assigned");
        self.events
            .dispatch(self.event(ctx, EventName::LeadAssigned, &lead).with_old(&before).with_new(&lead))
            .await;
        Ok(lead)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let lead = self.load(ctx, id, Ability::Delete).await?;
        self.leads.delete(&lead.id).await?;
        info!(lead_id = %lead.id, "Lead deleted");
        self.events
            .dispatch(self.event(ctx, EventName::LeadDeleted, &lead).with_old(&lead))
            .await;
        Ok(())
    }

    /// Creates a deal in `qualification` from the lead and marks the lead converted.
    pub async fn convert(&self, ctx: &RequestContext, id: &Uuid, input: ConvertLeadInput) -> Result<ConversionResult, DomainError> {
        input.validate()?;
        let mut lead = self.load(ctx, id, Ability::Convert).await?;
        if !lead.status.is_convertible() {
            return Err(DomainError::transition("Lead", lead.status, LeadStatus::Converted));
        }
        ResourcePolicy::DEALS.authorize(&ctx.actor, Ability::Create, Some(lead.tenant_id))?;
        let before = lead.clone();

        let currency = input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let mut deal = Deal::new(lead.tenant_id, lead.deal_title(), currency, ctx.actor_id());
        deal.lead_id = Some(lead.id);
        deal.contact_name = Some(lead.name.clone());
        deal.contact_email = lead.email.clone();
        deal.company = lead.company.clone();
        deal.value = lead.estimated_value;
        deal.owner_id = lead.owner_id;
        deal.expected_close_date = input.expected_close_date;
        deal.move_to(DealStage::Qualification, None)?;

        lead.mark_converted(deal.id)?;
        lead.touch(ctx.actor_id());
        let (lead, deal) = self.leads.convert(&lead, &deal).await?;

        info!(lead_id = %lead.id, deal_id = %deal.id, "Lead converted");
        self.events
            .dispatch(self.event(ctx, EventName::LeadConverted, &lead).with_old(&before).with_new(&lead))
            .await;
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::DealCreated, Some(deal.tenant_id), "Deal", deal.id)
                    .with_new(&deal),
            )
            .await;
        Ok(ConversionResult { lead, deal })
    }

    fn apply(lead: &mut Lead, input: LeadInput) {
        if input.email.is_some() {
            lead.email = non_blank(input.email).map(|e| e.to_lowercase());
        }
        if input.phone.is_some() {
            lead.phone = non_blank(input.phone);
        }
        if input.company.is_some() {
            lead.company = non_blank(input.company);
        }
        if input.source.is_some() {
            lead.source = non_blank(input.source);
        }
        if let Some(value) = input.estimated_value {
            lead.estimated_value = value;
        }
        if input.notes.is_some() {
            lead.notes = input.notes;
        }
    }

    /// Owners must be active users of the same tenant.
    async fn ensure_owner(&self, tenant_id: Uuid, owner_id: Option<Uuid>) -> Result<(), DomainError> {
        let Some(owner_id) = owner_id else {
            return Ok(());
        };
        let scope = crate::tenancy::TenantScope::Tenant(tenant_id);
        match self.users.find_by_id(&scope, &owner_id).await? {
            Some(user) if user.can_login() => Ok(()),
            _ => Err(DomainError::ValidationError(format!(
                "owner {} is not an active user of this tenant",
                owner_id
            ))),
        }
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Lead, DomainError> {
        let lead = found(self.leads.find_by_id(&ctx.scope, id).await?, "Lead", id)?;
        ResourcePolicy::LEADS.authorize(&ctx.actor, ability, Some(lead.tenant_id))?;
        Ok(lead)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, lead: &Lead) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(lead.tenant_id), "Lead", lead.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::{MockLeadRepository, MockUserRepository};
    use crate::tenancy::TenantScope;

    fn sales(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["crm.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn lead(tenant_id: Uuid) -> Lead {
        let mut lead = Lead::new(tenant_id, "Siti".into(), None);
        lead.company = Some("Nusantara Foods".into());
        lead.estimated_value = 2_500_000;
        lead.owner_id = Some(Uuid::new_v4());
        lead
    }

    #[tokio::test]
    async fn test_convert_creates_qualified_deal() {
        let tenant = Uuid::new_v4();
        let stored = lead(tenant);
        let owner = stored.owner_id;

        let mut leads = MockLeadRepository::new();
        let found_lead = stored.clone();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(found_lead.clone())));
        leads.expect_update().never();
        leads
            .expect_convert()
            .withf(move |l: &Lead, d: &Deal| {
                l.status == LeadStatus::Converted
                    && l.converted_deal_id == Some(d.id)
                    && d.title == "Nusantara Foods"
                    && d.stage == DealStage::Qualification
                    && d.probability == 20
                    && d.value == 2_500_000
                    && d.owner_id == owner
            })
            .times(1)
            .returning(|l, d| Ok((l.clone(), d.clone())));

        let svc = LeadService::new(Arc::new(leads), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let result = svc
            .convert(&sales(tenant), &stored.id, ConvertLeadInput::default())
            .await
            .unwrap();

        assert_eq!(result.lead.converted_deal_id, Some(result.deal.id));
        assert_eq!(result.deal.lead_id, Some(stored.id));
        assert_eq!(result.deal.currency, "USD");
    }

    #[tokio::test]
    async fn test_unqualified_lead_cannot_convert() {
        let tenant = Uuid::new_v4();
        let mut stored = lead(tenant);
        stored.status = LeadStatus::Unqualified;

        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        leads.expect_convert().never();

        let svc = LeadService::new(Arc::new(leads), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let err = svc
            .convert(&sales(tenant), &Uuid::new_v4(), ConvertLeadInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_conversion_loses_cleanly() {
        let tenant = Uuid::new_v4();
        let stored = lead(tenant);

        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        // The other request committed first; the guarded update matches no row.
        leads
            .expect_convert()
            .times(1)
            .returning(|l, _| Err(DomainError::Conflict(format!("lead {} can no longer be converted", l.id))));

        let svc = LeadService::new(Arc::new(leads), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let err = svc
            .convert(&sales(tenant), &Uuid::new_v4(), ConvertLeadInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_converted_lead_is_read_only() {
        let tenant = Uuid::new_v4();
        let mut stored = lead(tenant);
        stored.mark_converted(Uuid::new_v4()).unwrap();

        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        leads.expect_update().never();

        let svc = LeadService::new(Arc::new(leads), Arc::new(MockUserRepository::new()), EventDispatcher::default());
        let err = svc
            .change_status(&sales(tenant), &Uuid::new_v4(), LeadStatus::Contacted)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_assign_requires_tenant_user() {
        let tenant = Uuid::new_v4();
        let stored = lead(tenant);
        let mut leads = MockLeadRepository::new();
        leads.expect_find_by_id().returning(move |_, _| Ok(Some(stored.clone())));
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_, _| Ok(None));

        let svc = LeadService::new(Arc::new(leads), Arc::new(users), EventDispatcher::default());
        let err = svc
            .assign(&sales(tenant), &Uuid::new_v4(), Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_employee_cannot_view_leads() {
        let tenant = Uuid::new_v4();
        let ctx = RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant), false, vec!["hr.attendance.view".into()]),
            TenantScope::Tenant(tenant),
            RequestMeta::default(),
        );
        let svc = LeadService::new(
            Arc::new(MockLeadRepository::new()),
            Arc::new(MockUserRepository::new()),
            EventDispatcher::default(),
        );
        assert!(matches!(
            svc.list(&ctx, LeadFilter::default(), Pagination::default()).await,
            Err(DomainError::Forbidden(_))
        ));
    }
}
