//! Employee entity; `employee_code` matches the device `emp_code`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Employee {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,

    #[validate(length(min = 1, max = 50))]
    pub employee_code: String,

    #[validate(length(min = 1, max = 200))]
    pub full_name: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 100))]
    pub department: Option<String>,

    #[validate(length(max = 100))]
    pub position: Option<String>,

    pub hired_on: Option<NaiveDate>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
}

impl Employee {
    pub fn new(
        tenant_id: Uuid,
        employee_code: String,
        full_name: String,
        created_by: Option<Uuid>,
    ) -> Result<Self, validator::ValidationErrors> {
        let employee = Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: None,
            employee_code: employee_code.trim().to_string(),
            full_name: full_name.trim().to_string(),
            email: None,
            department: None,
            position: None,
            hired_on: None,
            is_active: true,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
        };
        employee.validate()?;
        Ok(employee)
    }

    pub fn touch(&mut self, by: Option<Uuid>) {
        self.modified_at = Some(Utc::now());
        self.modified_by = by;
    }
}
