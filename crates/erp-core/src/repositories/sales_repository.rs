//! Product, invoice and payment repository traits (ports)

use async_trait::async_trait;
use chrono::NaiveDate;
use erp_shared::{Page, Pagination};
use uuid::Uuid;

use crate::domain::{Invoice, InvoiceStatus, Payment, Product};
use crate::error::DomainError;
use crate::tenancy::TenantScope;

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    /// Matches number or customer name.
    pub search: Option<String>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Product>, DomainError>;
    async fn find_by_sku(&self, tenant_id: &Uuid, sku: &str) -> Result<Option<Product>, DomainError>;
    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Product>, DomainError>;
    async fn list(&self, scope: &TenantScope, filter: ProductFilter, pagination: Pagination) -> Result<Page<Product>, DomainError>;
    async fn create(&self, product: &Product) -> Result<Product, DomainError>;
    async fn update(&self, product: &Product) -> Result<Product, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Loads the invoice with its items.
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Invoice>, DomainError>;
    /// Items are not loaded for list results.
    async fn list(&self, scope: &TenantScope, filter: InvoiceFilter, pagination: Pagination) -> Result<Page<Invoice>, DomainError>;
    /// Reserves the next number in the tenant's per-year sequence.
    async fn next_sequence(&self, tenant_id: &Uuid, year: i32) -> Result<i64, DomainError>;
    async fn create(&self, invoice: &Invoice) -> Result<Invoice, DomainError>;
    /// Updates the header and replaces the items. Payment bookkeeping is left to
    /// the payment methods; a header whose `amount_paid` is stale is a `Conflict`.
    async fn update(&self, invoice: &Invoice) -> Result<Invoice, DomainError>;
    async fn delete(&self, id: &Uuid) -> Result<(), DomainError>;

    async fn payments(&self, invoice_id: &Uuid) -> Result<Vec<Payment>, DomainError>;
    async fn find_payment(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Payment>, DomainError>;
    /// Inserts the payment and stores the invoice totals in one transaction.
    /// Fails with `Conflict` when the stored amount paid is no longer `previous_paid`.
    async fn record_payment(&self, invoice: &Invoice, payment: &Payment, previous_paid: i64) -> Result<Payment, DomainError>;
    /// Deletes the payment and stores the invoice totals in one transaction.
    /// `NotFound` when the payment is already gone, `Conflict` when the totals moved.
    async fn remove_payment(&self, invoice: &Invoice, payment_id: &Uuid, previous_paid: i64) -> Result<(), DomainError>;
    /// Issued or partially paid invoices whose due date is before `today`.
    async fn list_overdue_candidates(&self, scope: &TenantScope, today: NaiveDate) -> Result<Vec<Invoice>, DomainError>;
}
