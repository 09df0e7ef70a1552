// ============================================================================
// ERP Infrastructure - PostgreSQL Workflow Repository
// File: crates/erp-infrastructure/src/database/postgres/workflow_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use erp_core::domain::{Condition, Workflow, WorkflowAction};
use erp_core::error::DomainError;
use erp_core::repositories::WorkflowRepository;
use erp_core::TenantScope;
use erp_shared::{Page, Pagination};

use super::db_error;

pub struct PgWorkflowRepository {
    pool: PgPool,
}

impl PgWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Conditions and actions live in JSONB columns.
#[derive(Debug, FromRow)]
struct WorkflowRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    trigger: String,
    conditions: Json<Vec<Condition>>,
    actions: Json<Vec<WorkflowAction>>,
    is_active: bool,
    run_count: i64,
    last_run_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
}

impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            trigger: row.trigger,
            conditions: row.conditions.0,
            actions: row.actions.0,
            is_active: row.is_active,
            run_count: row.run_count,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
        }
    }
}

const COLUMNS: &str = "id, tenant_id, name, description, trigger, conditions, actions, is_active, \
    run_count, last_run_at, created_at, created_by, modified_at, modified_by";

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    async fn find_by_id(&self, scope: &TenantScope, id: &Uuid) -> Result<Option<Workflow>, DomainError> {
        let row: Option<WorkflowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM workflows WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)",
            COLUMNS
        ))
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find workflow"))?;

        Ok(row.map(Workflow::from))
    }

    async fn list(&self, scope: &TenantScope, pagination: Pagination) -> Result<Page<Workflow>, DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflows WHERE ($1::uuid IS NULL OR tenant_id = $1)")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count workflows"))?;

        let rows: Vec<WorkflowRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM workflows
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(scope.tenant_id())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list workflows"))?;

        Ok(Page::new(rows.into_iter().map(Workflow::from).collect(), total, pagination))
    }

    async fn list_active_for_trigger(&self, tenant_id: &Uuid, trigger: &str) -> Result<Vec<Workflow>, DomainError> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM workflows WHERE tenant_id = $1 AND trigger = $2 AND is_active ORDER BY created_at ASC",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(trigger)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list workflows for trigger"))?;

        Ok(rows.into_iter().map(Workflow::from).collect())
    }

    async fn create(&self, workflow: &Workflow) -> Result<Workflow, DomainError> {
        let row: WorkflowRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO workflows (
                id, tenant_id, name, description, trigger, conditions, actions, is_active,
                run_count, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(workflow.id)
        .bind(workflow.tenant_id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&workflow.trigger)
        .bind(Json(&workflow.conditions))
        .bind(Json(&workflow.actions))
        .bind(workflow.is_active)
        .bind(workflow.run_count)
        .bind(workflow.created_at)
        .bind(workflow.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create workflow"))?;

        Ok(row.into())
    }

    async fn update(&self, workflow: &Workflow) -> Result<Workflow, DomainError> {
        let row: Option<WorkflowRow> = sqlx::query_as(&format!(
            r#"
            UPDATE workflows SET
                name = $2, description = $3, trigger = $4, conditions = $5, actions = $6,
                is_active = $7, modified_at = $8, modified_by = $9
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&workflow.trigger)
        .bind(Json(&workflow.conditions))
        .bind(Json(&workflow.actions))
        .bind(workflow.is_active)
        .bind(workflow.modified_at)
        .bind(workflow.modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update workflow"))?;

        row.map(Workflow::from).ok_or_else(|| DomainError::not_found("Workflow", workflow.id))
    }

    async fn delete(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete workflow"))?;
        Ok(())
    }

    async fn record_run(&self, id: &Uuid, at: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query("UPDATE workflows SET run_count = run_count + 1, last_run_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_error("record workflow run"))?;
        Ok(())
    }
}
