//! Webhook endpoint management, delivery history and test pings

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{WebhookDelivery, WebhookEndpoint};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName, WebhookDeliverer};
use crate::repositories::WebhookRepository;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWebhookInput {
    #[validate(url)]
    pub url: String,
    #[validate(length(max = 200))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWebhookInput {
    #[validate(url)]
    pub url: Option<String>,
    #[validate(length(max = 200))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub events: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Returned once on creation; the secret is never readable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedWebhook {
    #[serde(flatten)]
    pub endpoint: WebhookEndpoint,
    pub secret: String,
}

pub struct WebhookService {
    webhooks: Arc<dyn WebhookRepository>,
    deliverer: WebhookDeliverer,
    events: EventDispatcher,
}

impl WebhookService {
    pub fn new(webhooks: Arc<dyn WebhookRepository>, deliverer: WebhookDeliverer, events: EventDispatcher) -> Self {
        Self {
            webhooks,
            deliverer,
            events,
        }
    }

    /// Accepts `*`, exact event names and `family.*` patterns that match a known event.
    pub fn validate_subscriptions(events: &[String]) -> Result<(), DomainError> {
        for pattern in events {
            let known = pattern == "*"
                || EventName::from_str(pattern).is_some()
                || pattern.strip_suffix(".*").is_some_and(|family| {
                    EventName::ALL
                        .iter()
                        .any(|e| e.as_str().starts_with(family) && e.as_str()[family.len()..].starts_with('.'))
                });
            if !known {
                return Err(DomainError::ValidationError(format!("unknown event {}", pattern)));
            }
        }
        Ok(())
    }

    pub async fn list(&self, ctx: &RequestContext, pagination: Pagination) -> Result<Page<WebhookEndpoint>, DomainError> {
        ResourcePolicy::WEBHOOKS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.webhooks.list(&ctx.scope, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebhookEndpoint, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateWebhookInput) -> Result<CreatedWebhook, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::WEBHOOKS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;
        Self::validate_subscriptions(&input.events)?;

        let secret = erp_security::signature::generate_secret();
        let mut endpoint = WebhookEndpoint::new(tenant_id, input.url, input.events, secret.clone(), ctx.actor_id())?;
        endpoint.description = non_blank(input.description);

        let endpoint = self.webhooks.create(&endpoint).await?;
        info!(tenant_id = %tenant_id, endpoint_id = %endpoint.id, "Webhook endpoint created");
        self.events
            .dispatch(self.event(ctx, EventName::WebhookCreated, &endpoint).with_new(&endpoint))
            .await;
        Ok(CreatedWebhook { endpoint, secret })
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateWebhookInput) -> Result<WebhookEndpoint, DomainError> {
        input.validate()?;
        let mut endpoint = self.load(ctx, id, Ability::Update).await?;
        let before = endpoint.clone();

        if let Some(url) = non_blank(input.url) {
            endpoint.url = url;
        }
        if input.description.is_some() {
            endpoint.description = non_blank(input.description);
        }
        if let Some(events) = input.events {
            Self::validate_subscriptions(&events)?;
            endpoint.events = events;
        }
        if let Some(active) = input.is_active {
            endpoint.is_active = active;
        }
        endpoint.touch(ctx.actor_id());
        endpoint.validate()?;

        let endpoint = self.webhooks.update(&endpoint).await?;
        self.events
            .dispatch(self.event(ctx, EventName::WebhookUpdated, &endpoint).with_old(&before).with_new(&endpoint))
            .await;
        Ok(endpoint)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let endpoint = self.load(ctx, id, Ability::Delete).await?;
        self.webhooks.delete(&endpoint.id).await?;
        info!(endpoint_id = %endpoint.id, "Webhook endpoint deleted");
        self.events
            .dispatch(self.event(ctx, EventName::WebhookDeleted, &endpoint).with_old(&endpoint))
            .await;
        Ok(())
    }

    pub async fn deliveries(&self, ctx: &RequestContext, id: &Uuid, pagination: Pagination) -> Result<Page<WebhookDelivery>, DomainError> {
        let endpoint = self.load(ctx, id, Ability::View).await?;
        self.webhooks.list_deliveries(&endpoint.id, pagination).await
    }

    /// Sends one `webhook.ping` synchronously, regardless of subscriptions.
    pub async fn test(&self, ctx: &RequestContext, id: &Uuid) -> Result<WebhookDelivery, DomainError> {
        let endpoint = self.load(ctx, id, Ability::Update).await?;
        let event = self
            .event(ctx, EventName::WebhookPing, &endpoint)
            .with_new(&json!({ "endpoint_id": endpoint.id, "message": "ping" }));
        let delivery = self
            .deliverer
            .deliver(&endpoint, event.id, event.name.as_str(), &event.webhook_body(), Some(1))
            .await;
        Ok(delivery)
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<WebhookEndpoint, DomainError> {
        let endpoint = found(self.webhooks.find_by_id(&ctx.scope, id).await?, "WebhookEndpoint", id)?;
        ResourcePolicy::WEBHOOKS.authorize(&ctx.actor, ability, Some(endpoint.tenant_id))?;
        Ok(endpoint)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, endpoint: &WebhookEndpoint) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(endpoint.tenant_id), "WebhookEndpoint", endpoint.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::events::{MockWebhookSender, WebhookResponse};
    use crate::repositories::MockWebhookRepository;
    use crate::tenancy::TenantScope;
    use erp_shared::constants::WEBHOOK_SIGNATURE_HEADER;

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["core.webhooks.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn service(repo: MockWebhookRepository, sender: MockWebhookSender) -> WebhookService {
        let repo = Arc::new(repo);
        let deliverer = WebhookDeliverer::new(Arc::new(sender), repo.clone(), 3, 1);
        WebhookService::new(repo, deliverer, EventDispatcher::default())
    }

    #[test]
    fn test_subscription_patterns() {
        assert!(WebhookService::validate_subscriptions(&["*".into(), "lead.*".into(), "invoice.paid".into()]).is_ok());
        assert!(WebhookService::validate_subscriptions(&["lead.exploded".into()]).is_err());
        assert!(WebhookService::validate_subscriptions(&["lea.*".into()]).is_err());
    }

    #[tokio::test]
    async fn test_create_returns_secret_once() {
        let tenant = Uuid::new_v4();
        let mut repo = MockWebhookRepository::new();
        repo.expect_create().returning(|e| Ok(e.clone()));

        let svc = service(repo, MockWebhookSender::new());
        let created = svc
            .create(
                &ctx(tenant),
                CreateWebhookInput {
                    url: "https://hooks.example.com/erp".into(),
                    description: None,
                    events: vec!["deal.won".into()],
                },
            )
            .await
            .unwrap();

        assert!(created.secret.starts_with("whsec_"));
        let body = serde_json::to_value(&created).unwrap();
        assert_eq!(body["secret"], created.secret.as_str());
        let endpoint_only = serde_json::to_value(&created.endpoint).unwrap();
        assert!(endpoint_only.get("secret").is_none());
    }

    #[tokio::test]
    async fn test_ping_is_signed_and_single_attempt() {
        let tenant = Uuid::new_v4();
        let endpoint = WebhookEndpoint::new(
            tenant,
            "https://hooks.example.com/erp".into(),
            vec!["deal.won".into()],
            "whsec_test".into(),
            None,
        )
        .unwrap();

        let mut repo = MockWebhookRepository::new();
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(endpoint.clone())));
        repo.expect_record_delivery()
            .withf(|d| d.event == "webhook.ping" && d.attempt == 1 && !d.success)
            .times(1)
            .returning(|_| Ok(()));
        let mut sender = MockWebhookSender::new();
        sender
            .expect_send()
            .withf(|r| r.headers.iter().any(|(k, v)| k == WEBHOOK_SIGNATURE_HEADER && v.starts_with("sha256=")))
            .times(1)
            .returning(|_| Ok(WebhookResponse { status: 500, body: "nope".into() }));

        let svc = service(repo, sender);
        let delivery = svc.test(&ctx(tenant), &Uuid::new_v4()).await.unwrap();
        assert_eq!(delivery.response_status, Some(500));
        assert!(!delivery.success);
    }
}
