// ============================================================================
// ERP Core - Invoice Service
// File: crates/erp-core/src/services/invoice_service.rs
// Description: Invoice drafting, issuing, payments and overdue tracking
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use erp_shared::{Page, Pagination};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{found, non_blank};
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{Invoice, InvoiceItem, Payment, PaymentMethod, Product, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{InvoiceFilter, InvoiceRepository, ProductRepository};
use crate::tenancy::TenantScope;

/// Payment terms applied when no due date is given.
const DEFAULT_TERM_DAYS: i64 = 30;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoiceItemInput {
    pub product_id: Option<Uuid>,
    /// Defaults to the product name.
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = MAX_ITEM_QUANTITY))]
    pub quantity: i32,
    /// Defaults to the product price.
    #[validate(range(min = 0, max = MAX_UNIT_PRICE))]
    pub unit_price: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000))]
    pub discount_bps: i32,
    /// Defaults to the product tax rate, else zero.
    #[validate(range(min = 0, max = 10000))]
    pub tax_rate_bps: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub deal_id: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<InvoiceItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInvoiceInput {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub deal_id: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Replaces all items when present.
    #[validate(nested)]
    pub items: Option<Vec<InvoiceItemInput>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordPaymentInput {
    #[validate(range(min = 1))]
    pub amount: i64,
    #[serde(default)]
    pub method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub paid_at: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    products: Arc<dyn ProductRepository>,
    events: EventDispatcher,
}

impl InvoiceService {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, products: Arc<dyn ProductRepository>, events: EventDispatcher) -> Self {
        Self {
            invoices,
            products,
            events,
        }
    }

    pub async fn list(&self, ctx: &RequestContext, filter: InvoiceFilter, pagination: Pagination) -> Result<Page<Invoice>, DomainError> {
        ResourcePolicy::INVOICES.authorize(&ctx.actor, Ability::View, ctx.scope.tenant_id())?;
        self.invoices.list(&ctx.scope, filter, pagination).await
    }

    pub async fn get(&self, ctx: &RequestContext, id: &Uuid) -> Result<Invoice, DomainError> {
        self.load(ctx, id, Ability::View).await
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateInvoiceInput) -> Result<Invoice, DomainError> {
        let tenant_id = ctx.require_tenant()?;
        ResourcePolicy::INVOICES.authorize(&ctx.actor, Ability::Create, Some(tenant_id))?;
        input.validate()?;

        let issue_date = input.issue_date.unwrap_or_else(today);
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(DEFAULT_TERM_DAYS));
        let mut invoice = Invoice::new(
            tenant_id,
            String::new(),
            input.customer_name,
            input.currency.unwrap_or_else(|| "USD".to_string()),
            issue_date,
            due_date,
            ctx.actor_id(),
        )?;
        invoice.customer_email = non_blank(input.customer_email).map(|e| e.to_lowercase());
        invoice.customer_address = non_blank(input.customer_address);
        invoice.deal_id = input.deal_id;
        invoice.notes = input.notes;
        let items = self.build_items(&invoice, input.items).await?;
        invoice.replace_items(items)?;
        invoice.validate()?;

        // Reserved last so a rejected draft does not leave a gap in the numbering.
        let sequence = self.invoices.next_sequence(&tenant_id, issue_date.year()).await?;
        invoice.number = Invoice::format_number(issue_date.year(), sequence);

        let invoice = self.invoices.create(&invoice).await?;
        info!(tenant_id = %tenant_id, number = %invoice.number, total = invoice.total, "Invoice created");
        self.events
            .dispatch(self.event(ctx, EventName::InvoiceCreated, &invoice).with_new(&invoice))
            .await;
        Ok(invoice)
    }

    pub async fn update(&self, ctx: &RequestContext, id: &Uuid, input: UpdateInvoiceInput) -> Result<Invoice, DomainError> {
        input.validate()?;
        let mut invoice = self.load(ctx, id, Ability::Update).await?;
        invoice.ensure_editable()?;
        let before = invoice.clone();

        if let Some(name) = non_blank(input.customer_name) {
            invoice.customer_name = name;
        }
        if input.customer_email.is_some() {
            invoice.customer_email = non_blank(input.customer_email).map(|e| e.to_lowercase());
        }
        if input.customer_address.is_some() {
            invoice.customer_address = non_blank(input.customer_address);
        }
        if input.deal_id.is_some() {
            invoice.deal_id = input.deal_id;
        }
        if let Some(currency) = input.currency {
            invoice.currency = currency.to_uppercase();
        }
        if let Some(date) = input.issue_date {
            invoice.issue_date = date;
        }
        if let Some(date) = input.due_date {
            invoice.due_date = date;
        }
        if invoice.due_date < invoice.issue_date {
            return Err(DomainError::ValidationError("due_date must not be before issue_date".into()));
        }
        if input.notes.is_some() {
            invoice.notes = input.notes;
        }
        if let Some(items) = input.items {
            let items = self.build_items(&invoice, items).await?;
            invoice.replace_items(items)?;
        }
        invoice.touch(ctx.actor_id());
        invoice.validate()?;

        let invoice = self.invoices.update(&invoice).await?;
        self.events
            .dispatch(self.event(ctx, EventName::InvoiceUpdated, &invoice).with_old(&before).with_new(&invoice))
            .await;
        Ok(invoice)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &Uuid) -> Result<(), DomainError> {
        let invoice = self.load(ctx, id, Ability::Delete).await?;
        invoice.ensure_editable()?;
        self.invoices.delete(&invoice.id).await?;
        info!(number = %invoice.number, "Invoice deleted");
        self.events
            .dispatch(self.event(ctx, EventName::InvoiceDeleted, &invoice).with_old(&invoice))
            .await;
        Ok(())
    }

    pub async fn issue(&self, ctx: &RequestContext, id: &Uuid) -> Result<Invoice, DomainError> {
        let mut invoice = self.load(ctx, id, Ability::Issue).await?;
        let before = invoice.clone();
        invoice.issue(today())?;
        invoice.touch(ctx.actor_id());

        let invoice = self.invoices.update(&invoice).await?;
        info!(number = %invoice.number, status = %invoice.status, "Invoice issued");
        self.events
            .dispatch(self.event(ctx, EventName::InvoiceIssued, &invoice).with_old(&before).with_new(&invoice))
            .await;
        Ok(invoice)
    }

    pub async fn void(&self, ctx: &RequestContext, id: &Uuid) -> Result<Invoice, DomainError> {
        let mut invoice = self.load(ctx, id, Ability::Void).await?;
        let before = invoice.clone();
        invoice.void()?;
        invoice.touch(ctx.actor_id());

        let invoice = self.invoices.update(&invoice).await?;
        info!(number = %invoice.number, "Invoice voided");
        self.events
            .dispatch(self.event(ctx, EventName::InvoiceVoided, &invoice).with_old(&before).with_new(&invoice))
            .await;
        Ok(invoice)
    }

    /// Moves past-due invoices in scope to `overdue`. Returns how many changed.
    pub async fn mark_overdue(&self, ctx: &RequestContext, today: NaiveDate) -> Result<usize, DomainError> {
        ResourcePolicy::INVOICES.authorize(&ctx.actor, Ability::Update, ctx.scope.tenant_id())?;
        let candidates = self.invoices.list_overdue_candidates(&ctx.scope, today).await?;

        let mut marked = 0;
        for mut invoice in candidates {
            let before = invoice.clone();
            if !invoice.mark_overdue(today) {
                continue;
            }
            invoice.touch(ctx.actor_id());
            match self.invoices.update(&invoice).await {
                Ok(invoice) => {
                    marked += 1;
                    self.events
                        .dispatch(self.event(ctx, EventName::InvoiceOverdue, &invoice).with_old(&before).with_new(&invoice))
                        .await;
                }
                Err(e) => warn!(number = %invoice.number, error = %e, "Failed to mark invoice overdue"),
            }
        }
        info!(marked, %today, "Overdue invoices marked");
        Ok(marked)
    }

    pub async fn list_payments(&self, ctx: &RequestContext, invoice_id: &Uuid) -> Result<Vec<Payment>, DomainError> {
        let invoice = self.load(ctx, invoice_id, Ability::View).await?;
        ResourcePolicy::PAYMENTS.authorize(&ctx.actor, Ability::View, Some(invoice.tenant_id))?;
        self.invoices.payments(&invoice.id).await
    }

    pub async fn record_payment(&self, ctx: &RequestContext, invoice_id: &Uuid, input: RecordPaymentInput) -> Result<(Invoice, Payment), DomainError> {
        input.validate()?;
        let mut invoice = found(self.invoices.find_by_id(&ctx.scope, invoice_id).await?, "Invoice", invoice_id)?;
        ResourcePolicy::PAYMENTS.authorize(&ctx.actor, Ability::Create, Some(invoice.tenant_id))?;
        let before = invoice.clone();

        invoice.apply_payment(input.amount)?;
        invoice.touch(ctx.actor_id());
        let mut payment = Payment::new(
            invoice.tenant_id,
            invoice.id,
            input.amount,
            input.method,
            input.paid_at.unwrap_or_else(today),
            ctx.actor_id(),
        );
        payment.reference = non_blank(input.reference);
        payment.notes = input.notes;

        let payment = self
            .invoices
            .record_payment(&invoice, &payment, before.amount_paid)
            .await?;
        info!(number = %invoice.number, amount = payment.amount, balance_due = invoice.balance_due(), "Payment recorded");
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::PaymentRecorded, Some(payment.tenant_id), "Payment", payment.id)
                    .with_new(&payment),
            )
            .await;
        if invoice.status == crate::domain::InvoiceStatus::Paid {
            self.events
                .dispatch(self.event(ctx, EventName::InvoicePaid, &invoice).with_old(&before).with_new(&invoice))
                .await;
        }
        Ok((invoice, payment))
    }

    pub async fn delete_payment(&self, ctx: &RequestContext, payment_id: &Uuid) -> Result<Invoice, DomainError> {
        let payment = found(self.invoices.find_payment(&ctx.scope, payment_id).await?, "Payment", payment_id)?;
        ResourcePolicy::PAYMENTS.authorize(&ctx.actor, Ability::Delete, Some(payment.tenant_id))?;
        let mut invoice = found(
            self.invoices.find_by_id(&ctx.scope, &payment.invoice_id).await?,
            "Invoice",
            &payment.invoice_id,
        )?;

        let previous_paid = invoice.amount_paid;
        invoice.revert_payment(payment.amount, today())?;
        invoice.touch(ctx.actor_id());
        self.invoices
            .remove_payment(&invoice, &payment.id, previous_paid)
            .await?;
        info!(number = %invoice.number, payment_id = %payment.id, "Payment deleted");
        self.events
            .dispatch(
                DomainEvent::from_context(ctx, EventName::PaymentDeleted, Some(payment.tenant_id), "Payment", payment.id)
                    .with_old(&payment),
            )
            .await;
        Ok(invoice)
    }

    async fn build_items(&self, invoice: &Invoice, inputs: Vec<InvoiceItemInput>) -> Result<Vec<InvoiceItem>, DomainError> {
        let ids: Vec<Uuid> = inputs.iter().filter_map(|i| i.product_id).collect();
        let products: HashMap<Uuid, Product> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.products
                .find_many(&invoice.tenant_id, &ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        inputs
            .into_iter()
            .map(|input| {
                let product = match input.product_id {
                    Some(id) => {
                        let product = products
                            .get(&id)
                            .ok_or_else(|| DomainError::not_found("Product", id))?;
                        if !product.is_active {
                            return Err(DomainError::ValidationError(format!(
                                "product {} is inactive",
                                product.sku
                            )));
                        }
                        Some(product)
                    }
                    None => None,
                };
                let description = non_blank(input.description)
                    .or_else(|| product.map(|p| p.name.clone()))
                    .ok_or_else(|| DomainError::ValidationError("item description is required".into()))?;
                let unit_price = input
                    .unit_price
                    .or(product.map(|p| p.unit_price))
                    .ok_or_else(|| DomainError::ValidationError("item unit_price is required".into()))?;
                let tax_rate_bps = input
                    .tax_rate_bps
                    .or(product.map(|p| p.tax_rate_bps))
                    .unwrap_or(0);
                InvoiceItem::new(
                    invoice.id,
                    input.product_id,
                    description,
                    input.quantity,
                    unit_price,
                    input.discount_bps,
                    tax_rate_bps,
                )
            })
            .collect()
    }

    async fn load(&self, ctx: &RequestContext, id: &Uuid, ability: Ability) -> Result<Invoice, DomainError> {
        let invoice = found(self.invoices.find_by_id(&ctx.scope, id).await?, "Invoice", id)?;
        ResourcePolicy::INVOICES.authorize(&ctx.actor, ability, Some(invoice.tenant_id))?;
        Ok(invoice)
    }

    fn event(&self, ctx: &RequestContext, name: EventName, invoice: &Invoice) -> DomainEvent {
        DomainEvent::from_context(ctx, name, Some(invoice.tenant_id), "Invoice", invoice.id)
    }
}

/// Mark overdue invoices for every tenant as the system actor.
pub async fn mark_overdue_all(service: &InvoiceService, today: NaiveDate) -> Result<usize, DomainError> {
    service
        .mark_overdue(&RequestContext::system(TenantScope::All), today)
        .await
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Actor;
    use crate::context::RequestMeta;
    use crate::domain::InvoiceStatus;
    use crate::events::EventListener;
    use crate::repositories::{MockInvoiceRepository, MockProductRepository};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl EventListener for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<(), DomainError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ctx(tenant_id: Uuid) -> RequestContext {
        RequestContext::new(
            Actor::new(Uuid::new_v4(), Some(tenant_id), false, vec!["sales.*".into()]),
            TenantScope::Tenant(tenant_id),
            RequestMeta::default(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn issued_invoice(tenant_id: Uuid, total_price: i64) -> Invoice {
        let mut invoice = Invoice::new(
            tenant_id,
            "INV-2030-0001".into(),
            "PT Maju".into(),
            "IDR".into(),
            today(),
            today() + Duration::days(30),
            None,
        )
        .unwrap();
        invoice
            .replace_items(vec![InvoiceItem::new(invoice.id, None, "Consulting".into(), 1, total_price, 0, 0).unwrap()])
            .unwrap();
        invoice.issue(today()).unwrap();
        invoice
    }

    fn item(product_id: Option<Uuid>, quantity: i32) -> InvoiceItemInput {
        InvoiceItemInput {
            product_id,
            description: None,
            quantity,
            unit_price: None,
            discount_bps: 1_000,
            tax_rate_bps: None,
        }
    }

    #[tokio::test]
    async fn test_create_numbers_and_prices_from_products() {
        let tenant = Uuid::new_v4();
        let product = Product::new(tenant, "TP-80".into(), "Thermal printer".into(), 10_000, 1_100, None).unwrap();
        let product_id = product.id;

        let mut invoices = MockInvoiceRepository::new();
        invoices
            .expect_next_sequence()
            .withf(|_, year| *year == 2030)
            .returning(|_, _| Ok(7));
        invoices.expect_create().returning(|i| Ok(i.clone()));
        let mut products = MockProductRepository::new();
        products
            .expect_find_many()
            .returning(move |_, _| Ok(vec![product.clone()]));

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(products), EventDispatcher::default());
        let invoice = svc
            .create(
                &ctx(tenant),
                CreateInvoiceInput {
                    customer_name: "PT Maju".into(),
                    customer_email: Some("Billing@Maju.co.id".into()),
                    customer_address: None,
                    deal_id: None,
                    currency: Some("idr".into()),
                    issue_date: Some(date(2030, 3, 1)),
                    due_date: None,
                    notes: None,
                    items: vec![item(Some(product_id), 3)],
                },
            )
            .await
            .unwrap();

        assert_eq!(invoice.number, "INV-2030-0007");
        assert_eq!(invoice.due_date, date(2030, 3, 31));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.items[0].description, "Thermal printer");
        // 30_000 - 10% = 27_000, + 11% tax = 29_970
        assert_eq!(invoice.subtotal, 30_000);
        assert_eq!(invoice.discount_total, 3_000);
        assert_eq!(invoice.tax_total, 2_970);
        assert_eq!(invoice.total, 29_970);
        assert_eq!(invoice.customer_email.as_deref(), Some("billing@maju.co.id"));
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let tenant = Uuid::new_v4();
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_next_sequence().never();
        invoices.expect_create().never();
        let mut products = MockProductRepository::new();
        products.expect_find_many().returning(|_, _| Ok(vec![]));

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(products), EventDispatcher::default());
        let err = svc
            .create(
                &ctx(tenant),
                CreateInvoiceInput {
                    customer_name: "PT Maju".into(),
                    customer_email: None,
                    customer_address: None,
                    deal_id: None,
                    currency: None,
                    issue_date: None,
                    due_date: None,
                    notes: None,
                    items: vec![item(Some(Uuid::new_v4()), 1)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Product", .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_item_rejected_without_reserving_number() {
        let tenant = Uuid::new_v4();
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_next_sequence().never();
        invoices.expect_create().never();

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        let mut big = item(None, MAX_ITEM_QUANTITY);
        big.description = Some("Bulk".into());
        big.unit_price = Some(MAX_UNIT_PRICE);
        let input = CreateInvoiceInput {
            customer_name: "PT Maju".into(),
            customer_email: None,
            customer_address: None,
            deal_id: None,
            currency: None,
            issue_date: None,
            due_date: None,
            notes: None,
            items: (0..10).map(|_| big.clone()).collect(),
        };
        let err = svc.create(&ctx(tenant), input).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));

        let mut over = item(None, MAX_ITEM_QUANTITY + 1);
        over.unit_price = Some(1);
        assert!(over.validate().is_err());
    }

    #[tokio::test]
    async fn test_full_payment_marks_paid() {
        let tenant = Uuid::new_v4();
        let invoice = issued_invoice(tenant, 50_000);
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        invoices
            .expect_record_payment()
            .withf(|inv, p, previous_paid| inv.status == InvoiceStatus::Paid && p.amount == 50_000 && *previous_paid == 0)
            .times(1)
            .returning(|_, p, _| Ok(p.clone()));

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        let (invoice, payment) = svc
            .record_payment(
                &ctx(tenant),
                &Uuid::new_v4(),
                RecordPaymentInput {
                    amount: 50_000,
                    method: PaymentMethod::BankTransfer,
                    reference: Some("TRX-1".into()),
                    paid_at: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(invoice.balance_due(), 0);
        assert!(invoice.paid_at.is_some());
        assert_eq!(payment.reference.as_deref(), Some("TRX-1"));
    }

    #[tokio::test]
    async fn test_concurrent_payment_conflict_is_not_swallowed() {
        let tenant = Uuid::new_v4();
        let mut invoice = issued_invoice(tenant, 50_000);
        invoice.apply_payment(20_000).unwrap();
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        // Another request moved amount_paid after this one loaded the invoice.
        invoices
            .expect_record_payment()
            .withf(|inv, _, previous_paid| *previous_paid == 20_000 && inv.amount_paid == 50_000)
            .times(1)
            .returning(|_, _, _| Err(DomainError::Conflict("invoice was modified concurrently".into())));

        let dispatched = Arc::new(AtomicUsize::new(0));
        let events = EventDispatcher::new(vec![Arc::new(Counting(dispatched.clone()))]);
        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), events);
        let err = svc
            .record_payment(
                &ctx(tenant),
                &Uuid::new_v4(),
                RecordPaymentInput {
                    amount: 30_000,
                    method: PaymentMethod::Cash,
                    reference: None,
                    paid_at: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(dispatched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deleting_already_removed_payment_is_not_found() {
        let tenant = Uuid::new_v4();
        let mut invoice = issued_invoice(tenant, 50_000);
        invoice.apply_payment(50_000).unwrap();
        let payment = Payment::new(tenant, invoice.id, 50_000, PaymentMethod::Cash, today(), None);
        let payment_id = payment.id;

        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_payment().returning(move |_, _| Ok(Some(payment.clone())));
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        invoices
            .expect_remove_payment()
            .times(1)
            .returning(|_, id, _| Err(DomainError::not_found("Payment", id)));

        let dispatched = Arc::new(AtomicUsize::new(0));
        let events = EventDispatcher::new(vec![Arc::new(Counting(dispatched.clone()))]);
        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), events);
        let err = svc.delete_payment(&ctx(tenant), &payment_id).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound { entity: "Payment", .. }));
        assert_eq!(dispatched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overpayment_rejected() {
        let tenant = Uuid::new_v4();
        let invoice = issued_invoice(tenant, 50_000);
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        invoices.expect_record_payment().never();

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        let err = svc
            .record_payment(
                &ctx(tenant),
                &Uuid::new_v4(),
                RecordPaymentInput {
                    amount: 50_001,
                    method: PaymentMethod::Cash,
                    reference: None,
                    paid_at: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_deleting_payment_reopens_invoice() {
        let tenant = Uuid::new_v4();
        let mut invoice = issued_invoice(tenant, 50_000);
        invoice.apply_payment(50_000).unwrap();
        let payment = Payment::new(tenant, invoice.id, 50_000, PaymentMethod::Cash, today(), None);
        let payment_id = payment.id;

        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_payment().returning(move |_, _| Ok(Some(payment.clone())));
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        invoices
            .expect_remove_payment()
            .withf(move |inv, id, previous_paid| {
                *id == payment_id && inv.status == InvoiceStatus::Issued && inv.amount_paid == 0 && *previous_paid == 50_000
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        let invoice = svc.delete_payment(&ctx(tenant), &payment_id).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Issued);
        assert!(invoice.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_issued_invoice_cannot_be_deleted() {
        let tenant = Uuid::new_v4();
        let invoice = issued_invoice(tenant, 1_000);
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_find_by_id().returning(move |_, _| Ok(Some(invoice.clone())));
        invoices.expect_delete().never();

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        assert!(matches!(
            svc.delete(&ctx(tenant), &Uuid::new_v4()).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_overdue_counts_changed_invoices() {
        let tenant = Uuid::new_v4();
        let mut late = issued_invoice(tenant, 1_000);
        late.due_date = date(2020, 1, 1);
        late.issue_date = date(2019, 12, 1);
        let on_time = issued_invoice(tenant, 1_000);

        let mut invoices = MockInvoiceRepository::new();
        invoices
            .expect_list_overdue_candidates()
            .returning(move |_, _| Ok(vec![late.clone(), on_time.clone()]));
        invoices
            .expect_update()
            .withf(|i| i.status == InvoiceStatus::Overdue)
            .times(1)
            .returning(|i| Ok(i.clone()));

        let svc = InvoiceService::new(Arc::new(invoices), Arc::new(MockProductRepository::new()), EventDispatcher::default());
        let marked = mark_overdue_all(&svc, today()).await.unwrap();
        assert_eq!(marked, 1);
    }
}
