// ============================================================================
// ERP Core - Invoice Entity
// File: crates/erp-core/src/domain/invoice.rs
// Description: Invoice with line items, totals and payment status
// ============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::money::{apply_bps, checked_sum};
use crate::error::DomainError;

pub const MAX_ITEM_QUANTITY: i32 = 1_000_000;
/// Minor units.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "issued" => Some(InvoiceStatus::Issued),
            "partially_paid" => Some(InvoiceStatus::PartiallyPaid),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }

    /// Statuses that accept payments and count as outstanding.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,

    #[validate(length(min = 1, max = 500))]
    pub description: String,

    #[validate(range(min = 1, max = MAX_ITEM_QUANTITY))]
    pub quantity: i32,

    #[validate(range(min = 0, max = MAX_UNIT_PRICE))]
    pub unit_price: i64,

    #[validate(range(min = 0, max = 10000))]
    pub discount_bps: i32,

    #[validate(range(min = 0, max = 10000))]
    pub tax_rate_bps: i32,

    pub line_subtotal: i64,
    pub line_discount: i64,
    pub line_tax: i64,
    pub line_total: i64,
    pub position: i32,
}

impl InvoiceItem {
    pub fn new(
        invoice_id: Uuid,
        product_id: Option<Uuid>,
        description: String,
        quantity: i32,
        unit_price: i64,
        discount_bps: i32,
        tax_rate_bps: i32,
    ) -> Result<Self, DomainError> {
        let mut item = Self {
            id: Uuid::new_v4(),
            invoice_id,
            product_id,
            description: description.trim().to_string(),
            quantity,
            unit_price,
            discount_bps,
            tax_rate_bps,
            line_subtotal: 0,
            line_discount: 0,
            line_tax: 0,
            line_total: 0,
            position: 0,
        };
        item.recalculate()?;
        Ok(item)
    }

    /// Discount applies before tax; tax is charged on the discounted amount.
    pub fn recalculate(&mut self) -> Result<(), DomainError> {
        let subtotal = self
            .unit_price
            .checked_mul(self.quantity as i64)
            .ok_or_else(|| line_too_large(&self.description))?;
        let discount = apply_bps(subtotal, self.discount_bps);
        let taxable = subtotal - discount;
        let tax = apply_bps(taxable, self.tax_rate_bps);
        let total = taxable
            .checked_add(tax)
            .ok_or_else(|| line_too_large(&self.description))?;

        self.line_subtotal = subtotal;
        self.line_discount = discount;
        self.line_tax = tax;
        self.line_total = total;
        Ok(())
    }
}

fn line_too_large(description: &str) -> DomainError {
    DomainError::ValidationError(format!("amount of item '{}' is out of range", description))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub deal_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,

    #[validate(email)]
    pub customer_email: Option<String>,

    pub customer_address: Option<String>,

    #[validate(length(equal = 3))]
    pub currency: String,

    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,

    #[validate(nested)]
    pub items: Vec<InvoiceItem>,

    pub subtotal: i64,
    pub discount_total: i64,
    pub tax_total: i64,
    pub total: i64,
    pub amount_paid: i64,
    pub notes: Option<String>,

    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Invoice {
    pub fn new(
        tenant_id: Uuid,
        number: String,
        customer_name: String,
        currency: String,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        created_by: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        if due_date < issue_date {
            return Err(DomainError::ValidationError("due_date must not be before issue_date".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            number,
            deal_id: None,
            customer_name: customer_name.trim().to_string(),
            customer_email: None,
            customer_address: None,
            currency: currency.to_uppercase(),
            status: InvoiceStatus::Draft,
            issue_date,
            due_date,
            items: Vec::new(),
            subtotal: 0,
            discount_total: 0,
            tax_total: 0,
            total: 0,
            amount_paid: 0,
            notes: None,
            issued_at: None,
            paid_at: None,
            voided_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        })
    }

    /// `INV-2024-0007`
    pub fn format_number(year: i32, sequence: i64) -> String {
        format!("INV-{}-{:04}", year, sequence)
    }

    pub fn replace_items(&mut self, items: Vec<InvoiceItem>) -> Result<(), DomainError> {
        self.ensure_editable()?;
        self.items = items
            .into_iter()
            .enumerate()
            .map(|(idx, mut item)| {
                item.invoice_id = self.id;
                item.position = idx as i32;
                item.recalculate()?;
                Ok(item)
            })
            .collect::<Result<_, DomainError>>()?;
        self.recalculate()
    }

    /// Fails instead of wrapping when the totals leave the `i64` range.
    pub fn recalculate(&mut self) -> Result<(), DomainError> {
        let too_large = || DomainError::ValidationError("invoice total is out of range".into());
        self.subtotal = checked_sum(self.items.iter().map(|i| i.line_subtotal)).ok_or_else(too_large)?;
        self.discount_total = checked_sum(self.items.iter().map(|i| i.line_discount)).ok_or_else(too_large)?;
        self.tax_total = checked_sum(self.items.iter().map(|i| i.line_tax)).ok_or_else(too_large)?;
        self.total = checked_sum(self.items.iter().map(|i| i.line_total)).ok_or_else(too_large)?;
        Ok(())
    }

    pub fn balance_due(&self) -> i64 {
        (self.total - self.amount_paid).max(0)
    }

    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::Conflict(format!(
                "invoice {} is {} and can no longer be edited",
                self.number, self.status
            )));
        }
        Ok(())
    }

    pub fn issue(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::transition("Invoice", self.status, InvoiceStatus::Issued));
        }
        if self.items.is_empty() {
            return Err(DomainError::ValidationError("invoice has no items".into()));
        }
        if self.total <= 0 {
            return Err(DomainError::ValidationError("invoice total must be positive".into()));
        }
        self.status = if self.due_date < today {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Issued
        };
        self.issued_at = Some(Utc::now());
        Ok(())
    }

    pub fn void(&mut self) -> Result<(), DomainError> {
        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Void) || self.amount_paid > 0 {
            return Err(DomainError::transition("Invoice", self.status, InvoiceStatus::Void));
        }
        self.status = InvoiceStatus::Void;
        self.voided_at = Some(Utc::now());
        Ok(())
    }

    pub fn apply_payment(&mut self, amount: i64) -> Result<(), DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::Conflict(format!(
                "invoice {} is {} and does not accept payments",
                self.number, self.status
            )));
        }
        if amount <= 0 {
            return Err(DomainError::ValidationError("payment amount must be positive".into()));
        }
        if amount > self.balance_due() {
            return Err(DomainError::ValidationError(format!(
                "payment amount {} exceeds balance due {}",
                amount,
                self.balance_due()
            )));
        }
        self.amount_paid += amount;
        if self.balance_due() == 0 {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(Utc::now());
        } else if self.status == InvoiceStatus::Issued {
            self.status = InvoiceStatus::PartiallyPaid;
        }
        Ok(())
    }

    /// Undo a payment and derive the status from the remaining balance.
    pub fn revert_payment(&mut self, amount: i64, today: NaiveDate) -> Result<(), DomainError> {
        if matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Void) {
            return Err(DomainError::Conflict(format!(
                "invoice {} is {} and has no payments",
                self.number, self.status
            )));
        }
        self.amount_paid = (self.amount_paid - amount).max(0);
        self.paid_at = None;
        self.status = if self.due_date < today {
            InvoiceStatus::Overdue
        } else if self.amount_paid > 0 {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Issued
        };
        Ok(())
    }

    /// Returns true when the invoice became overdue.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        if matches!(self.status, InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid) && self.due_date < today {
            self.status = InvoiceStatus::Overdue;
            true
        } else {
            false
        }
    }

    pub fn days_past_due(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice() -> Invoice {
        let mut inv = Invoice::new(
            Uuid::new_v4(),
            Invoice::format_number(2024, 7),
            "Acme".into(),
            "usd".into(),
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        )
        .unwrap();
        let id = inv.id;
        inv.replace_items(vec![
            // 2 x 50.00 with 10% discount and 11% tax
            InvoiceItem::new(id, None, "Consulting".into(), 2, 5_000, 1_000, 1_100).unwrap(),
            InvoiceItem::new(id, None, "Setup".into(), 1, 2_500, 0, 0).unwrap(),
        ])
        .unwrap();
        inv
    }

    #[test]
    fn test_number_format() {
        assert_eq!(Invoice::format_number(2024, 7), "INV-2024-0007");
        assert_eq!(Invoice::format_number(2024, 12345), "INV-2024-12345");
    }

    #[test]
    fn test_totals() {
        let inv = invoice();
        assert_eq!(inv.subtotal, 12_500);
        assert_eq!(inv.discount_total, 1_000);
        assert_eq!(inv.tax_total, 990);
        assert_eq!(inv.total, 12_490);
        assert_eq!(inv.items[1].position, 1);
    }

    #[test]
    fn test_oversized_line_is_rejected_not_wrapped() {
        let result = InvoiceItem::new(Uuid::new_v4(), None, "Big".into(), 1_000_000, 10_000_000_000_000, 0, 0);
        assert!(matches!(result, Err(DomainError::ValidationError(_))));

        let item = InvoiceItem::new(Uuid::new_v4(), None, "Big".into(), 1, 10_000_000_000_000, 0, 0).unwrap();
        assert!(item.validate().is_err(), "unit price above the cap fails validation");
    }

    #[test]
    fn test_invoice_total_overflow_is_rejected() {
        let mut inv = Invoice::new(Uuid::new_v4(), "N".into(), "A".into(), "USD".into(), date(2024, 1, 1), date(2024, 1, 31), None).unwrap();
        let id = inv.id;
        let line = || InvoiceItem::new(id, None, "Max".into(), MAX_ITEM_QUANTITY, MAX_UNIT_PRICE, 0, 0).unwrap();
        let items = (0..10).map(|_| line()).collect();
        assert!(matches!(inv.replace_items(items), Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_due_before_issue_rejected() {
        let result = Invoice::new(Uuid::new_v4(), "N".into(), "A".into(), "USD".into(), date(2024, 2, 1), date(2024, 1, 1), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_requires_items() {
        let mut inv = Invoice::new(Uuid::new_v4(), "N".into(), "A".into(), "USD".into(), date(2024, 1, 1), date(2024, 1, 31), None).unwrap();
        assert!(inv.issue(date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_issue_locks_editing() {
        let mut inv = invoice();
        inv.issue(date(2024, 1, 2)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Issued);
        assert!(inv.replace_items(vec![]).is_err());
        assert!(inv.issue(date(2024, 1, 2)).is_err());
    }

    #[test]
    fn test_issue_after_due_is_overdue() {
        let mut inv = invoice();
        inv.issue(date(2024, 3, 1)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn test_payments_progress_status() {
        let mut inv = invoice();
        assert!(inv.apply_payment(100).is_err(), "draft does not accept payments");
        inv.issue(date(2024, 1, 2)).unwrap();
        inv.apply_payment(2_490).unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.balance_due(), 10_000);
        assert!(inv.apply_payment(10_001).is_err());
        assert!(inv.apply_payment(0).is_err());
        inv.apply_payment(10_000).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.paid_at.is_some());
        assert!(inv.apply_payment(1).is_err());
    }

    #[test]
    fn test_revert_payment() {
        let mut inv = invoice();
        inv.issue(date(2024, 1, 2)).unwrap();
        inv.apply_payment(inv.total).unwrap();
        inv.revert_payment(inv.total, date(2024, 1, 10)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Issued);
        assert_eq!(inv.amount_paid, 0);

        inv.apply_payment(1_000).unwrap();
        inv.apply_payment(1_000).unwrap();
        inv.revert_payment(1_000, date(2024, 1, 10)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);

        inv.revert_payment(1_000, date(2024, 2, 10)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn test_void_rules() {
        let mut inv = invoice();
        inv.issue(date(2024, 1, 2)).unwrap();
        inv.apply_payment(100).unwrap();
        assert!(inv.void().is_err());

        let mut inv = invoice();
        inv.void().unwrap();
        assert_eq!(inv.status, InvoiceStatus::Void);
        assert!(inv.void().is_err());
    }

    #[test]
    fn test_mark_overdue() {
        let mut inv = invoice();
        assert!(!inv.mark_overdue(date(2024, 6, 1)), "drafts never become overdue");
        inv.issue(date(2024, 1, 2)).unwrap();
        assert!(!inv.mark_overdue(date(2024, 1, 31)));
        assert!(inv.mark_overdue(date(2024, 2, 1)));
        assert_eq!(inv.status, InvoiceStatus::Overdue);
        assert_eq!(inv.days_past_due(date(2024, 2, 10)), 10);
    }
}
