//! Product catalog entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 64))]
    pub sku: String,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    pub description: Option<String>,

    /// Minor units.
    #[validate(range(min = 0))]
    pub unit_price: i64,

    #[validate(range(min = 0, max = 10000))]
    pub tax_rate_bps: i32,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Product {
    pub fn new(
        tenant_id: Uuid,
        sku: String,
        name: String,
        unit_price: i64,
        tax_rate_bps: i32,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let product = Self {
            id: Uuid::new_v4(),
            tenant_id,
            sku: sku.trim().to_uppercase(),
            name: name.trim().to_string(),
            description: None,
            unit_price,
            tax_rate_bps,
            is_active: true,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}
