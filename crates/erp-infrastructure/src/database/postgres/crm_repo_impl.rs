// ============================================================================
// ERP Infrastructure - PostgreSQL Lead & Deal Repositories
// File: crates/erp-infrastructure/src/database/postgres/crm_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

use erp_core::domain::{Deal, DealStage, Lead, LeadStatus};
use erp_core::error::DomainError;
use erp_core::repositories::{DealFilter, DealRepository, LeadFilter, LeadRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, like_pattern};

// ----------------------------------------------------------------------------
// Leads
// ----------------------------------------------------------------------------

pub struct PgLeadRepository {
    pool: PgPool,
}

impl PgLeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LeadRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    source: Option<String>,
    status: String,
    owner_id: Option<Uuid>,
    estimated_value: i64,
    notes: Option<String>,
    converted_deal_id: Option<Uuid>,
    converted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            source: row.source,
            status: LeadStatus::from_str(&row.status).unwrap_or_default(),
            owner_id: row.owner_id,
            estimated_value: row.estimated_value,
            notes: row.notes,
            converted_deal_id: row.converted_deal_id,
            converted_at: row.converted_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const LEAD_COLUMNS: &str = "id, tenant_id, name, email, phone, company, source, status, owner_id, \
    estimated_value, notes, converted_deal_id, converted_at, created_at, created_by, modified_at, modified_by";

const LEAD_PREDICATE: &str = r#"
    ($1::uuid IS NULL OR tenant_id = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::uuid IS NULL OR owner_id = $3)
      AND ($4::text IS NULL OR name ILIKE $4 OR email ILIKE $4 OR company ILIKE $4)
"#;

#[async_trait]
impl LeadRepository for PgLeadRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Lead>, DomainError> {
        let row: Option<LeadRow> = sqlx::query_as(&format!(
            "SELECT {} FROM leads WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            LEAD_COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find lead"))?;

        Ok(row.map(Lead::from))
    }

    async fn list(&self, scope: &TenantScope, filter: LeadFilter, pagination: Pagination) -> Result<Page<Lead>, DomainError> {
        let status = filter.status.map(|s| s.as_str());
        let pattern = like_pattern(filter.search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM leads WHERE {}", LEAD_PREDICATE))
            .bind(scope.tenant_id())
            .bind(status)
            .bind(filter.owner_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count leads"))?;

        let rows: Vec<LeadRow> = sqlx::query_as(&format!(
            "SELECT {} FROM leads WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            LEAD_COLUMNS, LEAD_PREDICATE
        ))
        .bind(scope.tenant_id())
        .bind(status)
        .bind(filter.owner_id)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list leads"))?;

        Ok(Page::new(rows.into_iter().map(Lead::from).collect(), total, pagination))
    }

    async fn create(&self, lead: &Lead) -> Result<Lead, DomainError> {
        let row: LeadRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO leads (
                id, tenant_id, name, email, phone, company, source, status, owner_id,
                estimated_value, notes, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(lead.id)
        .bind(lead.tenant_id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company)
        .bind(&lead.source)
        .bind(lead.status.as_str())
        .bind(lead.owner_id)
        .bind(lead.estimated_value)
        .bind(&lead.notes)
        .bind(lead.created_at)
        .bind(lead.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create lead"))?;

        Ok(row.into())
    }

    async fn update(&self, lead: &Lead) -> Result<Lead, DomainError> {
        let row: Option<LeadRow> = sqlx::query_as(&format!(
            r#"
            UPDATE leads SET
                name = $2, email = $3, phone = $4, company = $5, source = $6,
                status = $7, owner_id = $8, estimated_value = $9, notes = $10,
                converted_deal_id = $11, converted_at = $12,
                modified_at = $13, modified_by = $14
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company)
        .bind(&lead.source)
        .bind(lead.status.as_str())
        .bind(lead.owner_id)
        .bind(lead.estimated_value)
        .bind(&lead.notes)
        .bind(lead.converted_deal_id)
        .bind(lead.converted_at)
        .bind(lead.modified_at)
        .bind(lead.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update lead"))?;

        row.map(Lead::from).ok_or_else(|| DomainError::not_found("Lead", lead.id))
    }

    async fn convert(&self, lead: &Lead, deal: &Deal) -> Result<(Lead, Deal), DomainError> {
        let map_err = db_error("convert lead");
        let mut tx = self.pool.begin().await.map_err(&map_err)?;

        let deal_row = insert_deal(&mut *tx, deal).await.map_err(&map_err)?;

        let lead_row: Option<LeadRow> = sqlx::query_as(&format!(
            r#"
            UPDATE leads SET
                status = $2, converted_deal_id = $3, converted_at = $4,
                modified_at = $5, modified_by = $6
            WHERE id = $1 AND status NOT IN ('converted', 'unqualified')
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(lead.id)
        .bind(lead.status.as_str())
        .bind(lead.converted_deal_id)
        .bind(lead.converted_at)
        .bind(lead.modified_at)
        .bind(lead.modified_by)
        .fetch_optional(&mut *tx)
        .await
        .map_err(&map_err)?;

        // Dropping the transaction rolls the deal insert back.
        let lead_row = lead_row.ok_or_else(|| already_converted(lead))?;
        tx.commit().await.map_err(&map_err)?;

        Ok((lead_row.into(), deal_row.into()))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete lead"))?;
        Ok(())
    }
}

/// The guarded conversion matched nothing: the lead was converted, disqualified or removed meanwhile.
fn already_converted(lead: &Lead) -> DomainError {
    warn!(lead_id = %lead.id, "Lead changed before conversion committed");
    DomainError::Conflict(format!("lead {} can no longer be converted", lead.id))
}

// ----------------------------------------------------------------------------
// Deals
// ----------------------------------------------------------------------------

pub struct PgDealRepository {
    pool: PgPool,
}

impl PgDealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DealRow {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    lead_id: Option<Uuid>,
    contact_name: Option<String>,
    contact_email: Option<String>,
    company: Option<String>,
    value: i64,
    currency: String,
    stage: String,
    probability: i32,
    expected_close_date: Option<NaiveDate>,
    owner_id: Option<Uuid>,
    lost_reason: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<DealRow> for Deal {
    fn from(row: DealRow) -> Self {
        Deal {
            id: row.id,
            tenant_id: row.tenant_id,
            title: row.title,
            lead_id: row.lead_id,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            company: row.company,
            value: row.value,
            currency: row.currency,
            stage: DealStage::from_str(&row.stage).unwrap_or_default(),
            probability: row.probability,
            expected_close_date: row.expected_close_date,
            owner_id: row.owner_id,
            lost_reason: row.lost_reason,
            closed_at: row.closed_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const DEAL_COLUMNS: &str = "id, tenant_id, title, lead_id, contact_name, contact_email, company, value, \
    currency, stage, probability, expected_close_date, owner_id, lost_reason, closed_at, \
    created_at, created_by, modified_at, modified_by";

const DEAL_PREDICATE: &str = r#"
    ($1::uuid IS NULL OR tenant_id = $1)
      AND ($2::text IS NULL OR stage = $2)
      AND ($3::uuid IS NULL OR owner_id = $3)
      AND ($4::text IS NULL OR title ILIKE $4 OR company ILIKE $4 OR contact_name ILIKE $4)
"#;

async fn insert_deal(conn: &mut PgConnection, deal: &Deal) -> Result<DealRow, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        INSERT INTO deals (
            id, tenant_id, title, lead_id, contact_name, contact_email, company, value,
            currency, stage, probability, expected_close_date, owner_id, lost_reason, closed_at,
            created_at, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING {}
        "#,
        DEAL_COLUMNS
    ))
    .bind(deal.id)
    .bind(deal.tenant_id)
    .bind(&deal.title)
    .bind(deal.lead_id)
    .bind(&deal.contact_name)
    .bind(&deal.contact_email)
    .bind(&deal.company)
    .bind(deal.value)
    .bind(&deal.currency)
    .bind(deal.stage.as_str())
    .bind(deal.probability)
    .bind(deal.expected_close_date)
    .bind(deal.owner_id)
    .bind(&deal.lost_reason)
    .bind(deal.closed_at)
    .bind(deal.created_at)
    .bind(deal.created_by)
    .fetch_one(conn)
    .await
}

#[async_trait]
impl DealRepository for PgDealRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Deal>, DomainError> {
        let row: Option<DealRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deals WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            DEAL_COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find deal"))?;

        Ok(row.map(Deal::from))
    }

    async fn list(&self, scope: &TenantScope, filter: DealFilter, pagination: Pagination) -> Result<Page<Deal>, DomainError> {
        let stage = filter.stage.map(|s| s.as_str());
        let pattern = like_pattern(filter.search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM deals WHERE {}", DEAL_PREDICATE))
            .bind(scope.tenant_id())
            .bind(stage)
            .bind(filter.owner_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count deals"))?;

        let rows: Vec<DealRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deals WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            DEAL_COLUMNS, DEAL_PREDICATE
        ))
        .bind(scope.tenant_id())
        .bind(stage)
        .bind(filter.owner_id)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list deals"))?;

        Ok(Page::new(rows.into_iter().map(Deal::from).collect(), total, pagination))
    }

    async fn create(&self, deal: &Deal) -> Result<Deal, DomainError> {
        let map_err = db_error("create deal");
        let mut conn = self.pool.acquire().await.map_err(&map_err)?;
        let row = insert_deal(&mut *conn, deal).await.map_err(&map_err)?;
        Ok(row.into())
    }

    async fn update(&self, deal: &Deal) -> Result<Deal, DomainError> {
        let row: Option<DealRow> = sqlx::query_as(&format!(
            r#"
            UPDATE deals SET
                title = $2, contact_name = $3, contact_email = $4, company = $5,
                value = $6, currency = $7, stage = $8, probability = $9,
                expected_close_date = $10, owner_id = $11, lost_reason = $12, closed_at = $13,
                modified_at = $14, modified_by = $15
            WHERE id = $1
            RETURNING {}
            "#,
            DEAL_COLUMNS
        ))
        .bind(deal.id)
        .bind(&deal.title)
        .bind(&deal.contact_name)
        .bind(&deal.contact_email)
        .bind(&deal.company)
        .bind(deal.value)
        .bind(&deal.currency)
        .bind(deal.stage.as_str())
        .bind(deal.probability)
        .bind(deal.expected_close_date)
        .bind(deal.owner_id)
        .bind(&deal.lost_reason)
        .bind(deal.closed_at)
        .bind(deal.modified_at)
        .bind(deal.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update deal"))?;

        row.map(Deal::from).ok_or_else(|| DomainError::not_found("Deal", deal.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM deals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete deal"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_conversion_race_is_a_conflict() {
        let lead = Lead::new(Uuid::new_v4(), "Siti".into(), None);
        let err = already_converted(&lead);
        assert!(matches!(err, DomainError::Conflict(ref msg) if msg.contains(&lead.id.to_string())));
    }
}
