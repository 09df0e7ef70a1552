// ============================================================================
// ERP Infrastructure - PostgreSQL Product Repository
// File: crates/erp-infrastructure/src/database/postgres/product_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use erp_core::domain::Product;
use erp_core::error::DomainError;
use erp_core::repositories::{ProductFilter, ProductRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, is_unique_violation, like_pattern};

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    tenant_id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    unit_price: i64,
    tax_rate_bps: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            unit_price: row.unit_price,
            tax_rate_bps: row.tax_rate_bps,
            is_active: row.is_active,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, sku, name, description, unit_price, tax_rate_bps, is_active, \
    created_at, created_by, modified_at, modified_by";

const PREDICATE: &str = r#"
    ($1::uuid IS NULL OR tenant_id = $1)
      AND ($2::text IS NULL OR sku ILIKE $2 OR name ILIKE $2)
      AND ($3::bool IS NULL OR is_active = $3)
"#;

fn sku_taken(product: &Product) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Product",
        field: "sku",
        value: product.sku.clone(),
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find product"))?;

        Ok(row.map(Product::from))
    }

    async fn find_by_sku(&self, tenant_id: &Uuid, sku: &str) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE tenant_id = $1 AND sku = $2",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find product by sku"))?;

        Ok(row.map(Product::from))
    }

    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Product>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE tenant_id = $1 AND id = ANY($2)",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("find products"))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list(&self, scope: &TenantScope, filter: ProductFilter, pagination: Pagination) -> Result<Page<Product>, DomainError> {
        let pattern = like_pattern(filter.search);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {}", PREDICATE))
            .bind(scope.tenant_id())
            .bind(&pattern)
            .bind(filter.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count products"))?;

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE {} ORDER BY name ASC LIMIT $4 OFFSET $5",
            COLUMNS, PREDICATE
        ))
        .bind(scope.tenant_id())
        .bind(&pattern)
        .bind(filter.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list products"))?;

        Ok(Page::new(rows.into_iter().map(Product::from).collect(), total, pagination))
    }

    async fn create(&self, product: &Product) -> Result<Product, DomainError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, description, unit_price, tax_rate_bps, is_active,
                created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(product.id)
        .bind(product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return sku_taken(product);
            }
            error!("Database error creating product: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn update(&self, product: &Product) -> Result<Product, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r#"
            UPDATE products SET
                sku = $2, name = $3, description = $4, unit_price = $5,
                tax_rate_bps = $6, is_active = $7, modified_at = $8, modified_by = $9
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .bind(product.modified_at)
        .bind(product.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return sku_taken(product);
            }
            error!("Database error updating product: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(Product::from).ok_or_else(|| DomainError::not_found("Product", product.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete product"))?;
        Ok(())
    }
}
