//! Product catalog

use std::sync::Arc;

use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::Product;
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{ProductFilter, ProductRepository};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub unit_price: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000))]
    pub tax_rate_bps: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub unit_price: Option<i64>,
    #[validate(range(min = 0, max = 10000))]
    pub tax_rate_bps: Option<i32>,
    pub is_active: Option<bool>,
}

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    events: EventDispatcher,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>, events: EventDispatcher) -> Self {
        Self { products, events }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: ProductFilter, pagination: Pagination) -> Result<Page<Product>, DomainError> {
        ResourcePolicy::PRODUCTS.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.products.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Product, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateProductInput) -> Result<Product, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::PRODUCTS.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let mut product = Product::new(
            tenant_id,
            input.sku,
            input.name,
            input.unit_price,
            input.tax_rate_bps,
            ctx.actor_id(),
        )?;
        product.description = non_blank(input.description);
        self.ensure_sku_free(&product).await?;

        let product = self.products.create(&product).await?;
        info!(tenant_id = %tenant_id, sku = %product.sku, "Product created");
        self.events
            .dispatch(self.event(ctx, EventName::ProductCreated, &product).with_new(&product))
            .await;
        Ok(product)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateProductInput) -> Result<Product, DomainError> {
        input.validate()?;
        let mut product = self.load(ctx, id, Ability::Update).await?;
        let before = product.clone();

        if let Some(sku) = non_blank(input.sku) {
            product.sku = sku.to_uppercase();
        }
        if let Some(name) = non_blank(input.name) {
            product.name = name;
        }
        if input.description.is_some() {
            product.description = non_blank(input.description);
        }
        if let Some(price) = input.unit_price {
            product.unit_price = price;
        }
        if let Some(tax) = input.tax_rate_bps {
            product.tax_rate_bps = tax;
        }
        if let Some(active) = input.is_active {
            product.is_active = active;
        }
        if product.sku != before.sku {
            self.ensure_sku_free(&product).await?;
        }
        product.touch(ctx.actor_id());
        product.validate()?;

        let product = self.products.update(&product).await?;
        self.events
            .dispatch(self.event(ctx, EventName::ProductUpdated, &product).with_old(&before).with_new(&product))
            .await;
        Ok(product)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let product = self.load(ctx, id, Ability::Delete).await?;
        self.products.delete(&product.id).await?;
        info!(product_id = %product.id, "Product deleted");
        self.events
            .dispatch(self.event(ctx, EventName::ProductDeleted, &product).with_old(&product))
            .await;
        Ok(())
    }

    async fn ensure_sku_free(&self, product: &Product) -> Result<(), DomainError> {
        match self.products.find_by_sku(&product.tenant_id, &product.sku).await? {
            Some(existing) if existing.id != product.id => {
                Err(DomainError::already_exists("Product", "sku", product.sku.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Product, DomainError> {
        let product = found(self.products.find_by_id(&ctx.scope, id).await?, "Product", id)?;
        ResourcePolicy::PRODUCTS.authorize(&ctx.actor, ability, Some(product.tenant_id))?;
        Ok(product)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, product: &Product) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(product.tenant_id), "Product", product.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::repositories::MockProductRepository;
    use crate::tenancy::TenantScope;

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["sales.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn input(sku: &str) -> CreateProductInput {
        CreateProductInput {
            sku: sku.into(),
            name: "Thermal printer".into(),
            description: None,
            unit_price: 1_250_000,
            tax_rate_bps: 1_100,
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let tenant = Uuid::new_v4();
        let mut repo = MockProductRepository::new();
        repo.expect_find_by_sku()
            .withf(|_, sku| sku == "TP-80")
            .returning(move |t, _| Ok(Some(Product::new(*t, "TP-80".into(), "Other".into(), 1, 0, None).unwrap())));
        repo.expect_create().never();

        let svc = ProductService::new(Arc::new(repo), EventDispatcher::default());
        let err = svc.create(&ctx(tenant), input("tp-80")).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { field: "sku", .. }));
    }

    #[tokio::test]
    async fn test_create_normalizes_sku() {
        let tenant = Uuid::new_v4();
        let mut repo = MockProductRepository::new();
        repo.expect_find_by_sku().returning(|_, _| Ok(None));
        repo.expect_create().returning(|p| Ok(p.clone()));

        let svc = ProductService::new(Arc::new(repo), EventDispatcher::default());
        let product = svc.create(&ctx(tenant), input(" tp-80 ")).await.unwrap();
        assert_eq!(product.sku, "TP-80");
        assert_eq!(product.tenant_id, tenant);
        assert!(product.is_active);
    }
}
