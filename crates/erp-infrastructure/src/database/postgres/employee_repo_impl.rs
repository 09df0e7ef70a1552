// ============================================================================
// ERP Infrastructure - PostgreSQL Employee Repository
// File: crates/erp-infrastructure/src/database/postgres/employee_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use erp_core::domain::Employee;
use erp_core::error::DomainError;
use erp_core::repositories::{EmployeeFilter, EmployeeRepository};
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::{db_error, is_unique_violation, like_pattern};

pub struct PgEmployeeRepository {
    pool: PgPool,
}

impl PgEmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: Uuid,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
    employee_code: String,
    full_name: String,
    email: Option<String>,
    department: Option<String>,
    position: Option<String>,
    hired_on: Option<NaiveDate>,
    is_active: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            employee_code: row.employee_code,
            full_name: row.full_name,
            email: row.email,
            department: row.department,
            position: row.position,
            hired_on: row.hired_on,
            is_active: row.is_active,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, user_id, employee_code, full_name, email, department, position, \
    hired_on, is_active, created_at, created_by, modified_at, modified_by";

fn code_taken(employee: &Employee) -> DomainError {
    DomainError::AlreadyExists {
        entity: "Employee",
        field: "employee_code",
        value: employee.employee_code.clone(),
    }
}

#[async_trait]
impl EmployeeRepository for PgEmployeeRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Employee>, DomainError> {
        let row: Option<EmployeeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM employees WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find employee"))?;

        Ok(row.map(Employee::from))
    }

    async fn find_by_code(&self, tenant_id: &Uuid, code: &str) -> Result<Option<Employee>, DomainError> {
        let row: Option<EmployeeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM employees WHERE tenant_id = $1 AND employee_code = $2",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find employee by code"))?;

        Ok(row.map(Employee::from))
    }

    async fn find_by_codes(&self, tenant_id: &Uuid, codes: &[String]) -> Result<Vec<Employee>, DomainError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<EmployeeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM employees WHERE tenant_id = $1 AND employee_code = ANY($2)",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(codes)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("find employees by code"))?;

        Ok(rows.into_iter().map(Employee::from).collect())
    }

    async fn list(&self, scope: &TenantScope, filter: EmployeeFilter, pagination: Pagination) -> Result<Page<Employee>, DomainError> {
        let pattern = like_pattern(filter.search);
        let predicate = r#"
            ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::text IS NULL OR full_name ILIKE $2 OR employee_code ILIKE $2 OR department ILIKE $2)
              AND ($3::bool IS NULL OR is_active = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM employees WHERE {}", predicate))
            .bind(scope.tenant_id())
            .bind(&pattern)
            .bind(filter.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count employees"))?;

        let rows: Vec<EmployeeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM employees WHERE {} ORDER BY employee_code ASC LIMIT $4 OFFSET $5",
            COLUMNS, predicate
        ))
        .bind(scope.tenant_id())
        .bind(&pattern)
        .bind(filter.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list employees"))?;

        Ok(Page::new(rows.into_iter().map(Employee::from).collect(), total, pagination))
    }

    async fn create(&self, employee: &Employee) -> Result<Employee, DomainError> {
        let row: EmployeeRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO employees (
                id, tenant_id, user_id, employee_code, full_name, email, department, position,
                hired_on, is_active, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(employee.id)
        .bind(employee.tenant_id)
        .bind(employee.user_id)
        .bind(&employee.employee_code)
        .bind(&employee.full_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.hired_on)
        .bind(employee.is_active)
        .bind(employee.created_at)
        .bind(employee.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return code_taken(employee);
            }
            error!("Database error creating employee: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn update(&self, employee: &Employee) -> Result<Employee, DomainError> {
        let row: Option<EmployeeRow> = sqlx::query_as(&format!(
            r#"
            UPDATE employees SET
                user_id = $2, employee_code = $3, full_name = $4, email = $5,
                department = $6, position = $7, hired_on = $8, is_active = $9,
                modified_at = $10, modified_by = $11
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(employee.id)
        .bind(employee.user_id)
        .bind(&employee.employee_code)
        .bind(&employee.full_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.hired_on)
        .bind(employee.is_active)
        .bind(employee.modified_at)
        .bind(employee.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                return code_taken(employee);
            }
            error!("Database error updating employee: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        row.map(Employee::from).ok_or_else(|| DomainError::not_found("Employee", employee.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete employee"))?;
        Ok(())
    }
}
