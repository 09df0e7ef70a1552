// ============================================================================
// ERP Infrastructure - PostgreSQL Invoice Repository
// File: crates/erp-infrastructure/src/database/postgres/invoice_repo_impl.rs
// Description: Invoices with their line items and payments
// ============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use erp_core::domain::{Invoice, InvoiceItem, InvoiceStatus, Payment, PaymentMethod};
use erp_core::error::DomainError;
use erp_core::repositories::{InvoiceFilter, InvoiceRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, is_unique_violation, like_pattern};

pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    tenant_id: Uuid,
    number: String,
    deal_id: Option<Uuid>,
    customer_name: String,
    customer_email: Option<String>,
    customer_address: Option<String>,
    currency: String,
    status: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    subtotal: i64,
    discount_total: i64,
    tax_total: i64,
    total: i64,
    amount_paid: i64,
    notes: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    voided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            tenant_id: row.tenant_id,
            number: row.number,
            deal_id: row.deal_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_address: row.customer_address,
            currency: row.currency,
            status: InvoiceStatus::from_str(&row.status).unwrap_or_default(),
            issue_date: row.issue_date,
            due_date: row.due_date,
            items: Vec::new(),
            subtotal: row.subtotal,
            discount_total: row.discount_total,
            tax_total: row.tax_total,
            total: row.total,
            amount_paid: row.amount_paid,
            notes: row.notes,
            issued_at: row.issued_at,
            paid_at: row.paid_at,
            voided_at: row.voided_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct InvoiceItemRow {
    id: Uuid,
    invoice_id: Uuid,
    product_id: Option<Uuid>,
    description: String,
    quantity: i32,
    unit_price: i64,
    discount_bps: i32,
    tax_rate_bps: i32,
    line_subtotal: i64,
    line_discount: i64,
    line_tax: i64,
    line_total: i64,
    position: i32,
}

impl From<InvoiceItemRow> for InvoiceItem {
    fn from(row: InvoiceItemRow) -> Self {
        InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            product_id: row.product_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount_bps: row.discount_bps,
            tax_rate_bps: row.tax_rate_bps,
            line_subtotal: row.line_subtotal,
            line_discount: row.line_discount,
            line_tax: row.line_tax,
            line_total: row.line_total,
            position: row.position,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    tenant_id: Uuid,
    invoice_id: Uuid,
    amount: i64,
    method: String,
    reference: Option<String>,
    paid_at: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            tenant_id: row.tenant_id,
            invoice_id: row.invoice_id,
            amount: row.amount,
            method: PaymentMethod::from_str(&row.method).unwrap_or_default(),
            reference: row.reference,
            paid_at: row.paid_at,
            notes: row.notes,
            created_at: row.created_at,
            created_by: row.created_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, number, deal_id, customer_name, customer_email, customer_address, \
    currency, status, issue_date, due_date, subtotal, discount_total, tax_total, total, amount_paid, \
    notes, issued_at, paid_at, voided_at, created_at, created_by, modified_at, modified_by";

const ITEM_COLUMNS: &str = "id, invoice_id, product_id, description, quantity, unit_price, discount_bps, \
    tax_rate_bps, line_subtotal, line_discount, line_tax, line_total, position";

const PAYMENT_COLUMNS: &str = "id, tenant_id, invoice_id, amount, method, reference, paid_at, notes, \
    created_at, created_by";

const PREDICATE: &str = r#"
    ($1::uuid IS NULL OR tenant_id = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL OR number ILIKE $3 OR customer_name ILIKE $3)
"#;

impl PgInvoiceRepository {
    /// Attach items to each invoice with a single query.
    async fn attach_items(&self, invoices: &mut [Invoice]) -> Result<(), DomainError> {
        if invoices.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();
        let rows: Vec<InvoiceItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY position ASC",
            ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load invoice items"))?;

        let mut by_invoice: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
        for row in rows {
            by_invoice.entry(row.invoice_id).or_default().push(row.into());
        }
        for invoice in invoices.iter_mut() {
            invoice.items = by_invoice.remove(&invoice.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn insert_items(tx: &mut Transaction<'_, Postgres>, invoice: &Invoice) -> Result<(), sqlx::Error> {
        for item in &invoice.items {
            sqlx::query(&format!(
                "INSERT INTO invoice_items ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                ITEM_COLUMNS
            ))
            .bind(item.id)
            .bind(invoice.id)
            .bind(item.product_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount_bps)
            .bind(item.tax_rate_bps)
            .bind(item.line_subtotal)
            .bind(item.line_discount)
            .bind(item.line_tax)
            .bind(item.line_total)
            .bind(item.position)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Persist status and payment bookkeeping of the header, only while the
    /// stored `amount_paid` still equals `previous_paid`. Returns rows written.
    async fn store_totals(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &Invoice,
        previous_paid: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                status = $2, amount_paid = $3, paid_at = $4,
                modified_at = $5, modified_by = $6
            WHERE id = $1 AND amount_paid = $7
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.status.as_str())
        .bind(invoice.amount_paid)
        .bind(invoice.paid_at)
        .bind(invoice.modified_at)
        .bind(invoice.modified_by)
        .bind(previous_paid)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn exists(&self, id: &Uuid) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM invoices WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("check invoice"))
    }
}

/// A guarded header write that touched nothing lost a race with another payment.
fn ensure_current(rows_affected: u64, invoice: &Invoice) -> Result<(), DomainError> {
    if rows_affected == 0 {
        return Err(concurrent_change(invoice));
    }
    Ok(())
}

fn concurrent_change(invoice: &Invoice) -> DomainError {
    warn!(invoice_id = %invoice.id, "Invoice changed by a concurrent request");
    DomainError::Conflict(format!(
        "invoice {} was modified concurrently, reload and retry",
        invoice.number
    ))
}

fn number_taken(invoice: &Invoice) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Invoice",
        field: "number",
        value: invoice.number.clone(),
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Invoice>, DomainError> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find invoice"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut invoices = vec![Invoice::from(row)];
        self.attach_items(&mut invoices).await?;
        Ok(invoices.pop())
    }

    async fn list(&self, scope: &TenantScope, filter: InvoiceFilter, pagination: Pagination) -> Result<Page<Invoice>, DomainError> {
        let status = filter.status.map(|s| s.as_str());
        let pattern = like_pattern(filter.search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM invoices WHERE {}", PREDICATE))
            .bind(scope.tenant_id())
            .bind(status)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count invoices"))?;

        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE {} ORDER BY issue_date DESC, number DESC LIMIT $4 OFFSET $5",
            COLUMNS, PREDICATE
        ))
        .bind(scope.tenant_id())
        .bind(status)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list invoices"))?;

        Ok(Page::new(rows.into_iter().map(Invoice::from).collect(), total, pagination))
    }

    async fn next_sequence(&self, tenant_id: &Uuid, year: i32) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (tenant_id, year, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (tenant_id, year)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(tenant_id)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("reserve invoice number"))
    }

    async fn create(&self, invoice: &Invoice) -> Result<Invoice, DomainError> {
        let map_err = |e: sqlx::Error| {
            if is_unique_violation(&e) {
                return number_taken(invoice);
            }
            error!("Database error creating invoice: {}", e);
            DomainError::DatabaseError(e.to_string())
        };

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO invoices ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
            COLUMNS
        ))
        .bind(invoice.id)
        .bind(invoice.tenant_id)
        .bind(&invoice.number)
        .bind(invoice.deal_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_address)
        .bind(&invoice.currency)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.subtotal)
        .bind(invoice.discount_total)
        .bind(invoice.tax_total)
        .bind(invoice.total)
        .bind(invoice.amount_paid)
        .bind(&invoice.notes)
        .bind(invoice.issued_at)
        .bind(invoice.paid_at)
        .bind(invoice.voided_at)
        .bind(invoice.created_at)
        .bind(invoice.created_by)
        .bind(invoice.modified_at)
        .bind(invoice.modified_by)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        Self::insert_items(&mut tx, invoice).await.map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        info!(invoice_id = %invoice.id, number = %invoice.number, "Invoice created");
        Ok(invoice.clone())
    }

    async fn update(&self, invoice: &Invoice) -> Result<Invoice, DomainError> {
        let map_err = db_error("update invoice");
        let mut tx = self.pool.begin().await.map_err(&map_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE invoices SET
                deal_id = $2, customer_name = $3, customer_email = $4, customer_address = $5,
                currency = $6, status = $7, issue_date = $8, due_date = $9,
                subtotal = $10, discount_total = $11, tax_total = $12, total = $13,
                notes = $14, issued_at = $15, voided_at = $16,
                modified_at = $17, modified_by = $18
            WHERE id = $1 AND amount_paid = $19
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.deal_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_address)
        .bind(&invoice.currency)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.subtotal)
        .bind(invoice.discount_total)
        .bind(invoice.tax_total)
        .bind(invoice.total)
        .bind(&invoice.notes)
        .bind(invoice.issued_at)
        .bind(invoice.voided_at)
        .bind(invoice.modified_at)
        .bind(invoice.modified_by)
        .bind(invoice.amount_paid)
        .execute(&mut *tx)
        .await
        .map_err(&map_err)?;

        if updated.rows_affected() == 0 {
            drop(tx);
            if !self.exists(&invoice.id).await? {
                return Err(DomainError::not_found("Invoice", invoice.id));
            }
            return Err(concurrent_change(invoice));
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice.id)
            .execute(&mut *tx)
            .await
            .map_err(&map_err)?;
        Self::insert_items(&mut tx, invoice).await.map_err(&map_err)?;

        tx.commit().await.map_err(&map_err)?;
        Ok(invoice.clone())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete invoice"))?;
        Ok(())
    }

    async fn payments(&self, invoice_id: &Uuid) -> Result<Vec<Payment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY paid_at ASC, created_at ASC",
            PAYMENT_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payments"))?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }

    async fn find_payment(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find payment"))?;

        Ok(row.map(Payment::from))
    }

    async fn record_payment(&self, invoice: &Invoice, payment: &Payment, previous_paid: i64) -> Result<Payment, DomainError> {
        let map_err = db_error("record payment");
        let mut tx = self.pool.begin().await.map_err(&map_err)?;

        let row: PaymentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payments ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS, PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(payment.tenant_id)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .bind(payment.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(&map_err)?;

        let stored = Self::store_totals(&mut tx, invoice, previous_paid).await.map_err(&map_err)?;
        ensure_current(stored, invoice)?;
        tx.commit().await.map_err(&map_err)?;

        Ok(row.into())
    }

    async fn remove_payment(&self, invoice: &Invoice, payment_id: &Uuid, previous_paid: i64) -> Result<(), DomainError> {
        let map_err = db_error("remove payment");
        let mut tx = self.pool.begin().await.map_err(&map_err)?;

        let deleted = sqlx::query("DELETE FROM payments WHERE id = $1 AND invoice_id = $2")
            .bind(payment_id)
            .bind(invoice.id)
            .execute(&mut *tx)
            .await
            .map_err(&map_err)?;
        // Already removed by a concurrent request; the totals must not be reverted twice.
        if deleted.rows_affected() == 0 {
            return Err(DomainError::not_found("Payment", payment_id));
        }

        let stored = Self::store_totals(&mut tx, invoice, previous_paid).await.map_err(&map_err)?;
        ensure_current(stored, invoice)?;
        tx.commit().await.map_err(&map_err)?;
        Ok(())
    }

    async fn list_overdue_candidates(&self, scope: &TenantScope, today: NaiveDate) -> Result<Vec<Invoice>, DomainError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND status IN ('issued', 'partially_paid')
              AND due_date < $2
            ORDER BY due_date ASC
            "#,
            COLUMNS
        ))
        .bind(scope.tenant_id())
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list overdue candidates"))?;

        // Candidates are written back through `update`, which replaces items.
        let mut invoices: Vec<Invoice> = rows.into_iter().map(Invoice::from).collect();
        self.attach_items(&mut invoices).await?;
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Invoice {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Invoice::new(Uuid::new_v4(), "INV-2024-00007".into(), "Acme".into(), "USD".into(), day, day, None).unwrap()
    }

    #[test]
    fn test_stale_totals_write_is_a_conflict() {
        let err = ensure_current(0, &invoice()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(ref msg) if msg.contains("INV-2024-00007")));
    }

    #[test]
    fn test_current_totals_write_passes() {
        assert!(ensure_current(1, &invoice()).is_ok());
    }
}
