// ============================================================================
// ERP Core - Attendance Sync Service
// File: crates/erp-core/src/services/attendance_sync_service.rs
// Description: Pulls device transactions and rebuilds daily attendance
// ============================================================================

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use erp_shared::config::AttendanceSettings;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::found;
use crate::authorization::{Ability, ResourcePolicy};
use crate::context::RequestContext;
use crate::domain::{
    Attendance, AttendanceIntegration, AttendancePunch, Employee, TransactionPage, TransactionQuery,
};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventDispatcher, EventName};
use crate::repositories::{AttendanceIntegrationRepository, AttendanceRepository, EmployeeRepository};
use crate::tenancy::TenantScope;

/// Stops runaway pagination when a provider keeps reporting another page.
const MAX_PAGES: u32 = 10_000;

/// Attendance device API (ZKBioTime).
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait AttendanceProvider: Send + Sync {
    /// Exchanges credentials for an API token.
    async fn authenticate(&self, base_url: &str, username: &str, password: &str) -> Result<String, DomainError>;

    async fn fetch_transactions(&self, base_url: &str, token: &str, query: TransactionQuery) -> Result<TransactionPage, DomainError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Transactions whose `emp_code` matches no employee.
    pub skipped: usize,
    pub days_rebuilt: usize,
}

pub struct AttendanceSyncService {
    integrations: Arc<dyn AttendanceIntegrationRepository>,
    employees: Arc<dyn EmployeeRepository>,
    attendance: Arc<dyn AttendanceRepository>,
    provider: Arc<dyn AttendanceProvider>,
    events: EventDispatcher,
    settings: AttendanceSettings,
}

impl AttendanceSyncService {
    pub fn new(
        integrations: Arc<dyn AttendanceIntegrationRepository>,
        employees: Arc<dyn EmployeeRepository>,
        attendance: Arc<dyn AttendanceRepository>,
        provider: Arc<dyn AttendanceProvider>,
        events: EventDispatcher,
        settings: AttendanceSettings,
    ) -> Self {
        Self {
            integrations,
            employees,
            attendance,
            provider,
            events,
            settings,
        }
    }

    /// Sync the caller's tenant (or `tenant_id` for super admins).
    pub async fn sync_tenant(&self, ctx: &RequestContext, tenant_id: Uuid) -> Result<SyncReport, DomainError> {
        ResourcePolicy::ATTENDANCE.authorize(&ctx.actor, Ability::Sync, Some(tenant_id))?;
        let integration = found(
            self.integrations.find_by_tenant(&tenant_id).await?,
            "AttendanceIntegration",
            &tenant_id,
        )?;
        if !integration.enabled {
            return Err(DomainError::Conflict("attendance integration is disabled".into()));
        }
        self.run(ctx, integration).await
    }

    /// Sync every enabled integration. One failing tenant does not stop the rest.
    pub async fn sync_all(&self) -> Result<Vec<(Uuid, Result<SyncReport, DomainError>)>, DomainError> {
        let ctx = RequestContext::system(TenantScope::All);
        let integrations = self.integrations.list_enabled().await?;
        info!(count = integrations.len(), "Starting attendance sync for enabled integrations");

        let mut results = Vec::with_capacity(integrations.len());
        for integration in integrations {
            let tenant_id = integration.tenant_id;
            let result = self.run(&ctx, integration).await;
            results.push((tenant_id, result));
        }
        Ok(results)
    }

    /// Authenticates against the provider without fetching anything.
    pub async fn check_connection(&self, integration: &AttendanceIntegration) -> Result<(), DomainError> {
        self.provider
            .authenticate(&integration.base_url, &integration.username, &integration.password)
            .await
            .map(|_| ())
    }

    pub async fn enabled_integrations(&self) -> Result<Vec<AttendanceIntegration>, DomainError> {
        self.integrations.list_enabled().await
    }

    async fn run(&self, ctx: &RequestContext, mut integration: AttendanceIntegration) -> Result<SyncReport, DomainError> {
        let now = Utc::now();
        let started = std::time::Instant::now();

        match self.sync_window(&integration, now).await {
            Ok(report) => {
                integration.record_success(now);
                self.integrations.save(&integration).await?;
                info!(
                    tenant_id = %integration.tenant_id,
                    fetched = report.fetched,
                    created = report.created,
                    updated = report.updated,
                    skipped = report.skipped,
                    days_rebuilt = report.days_rebuilt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Attendance sync completed"
                );
                self.events
                    .dispatch(
                        DomainEvent::from_context(
                            ctx,
                            EventName::AttendanceSynced,
                            Some(integration.tenant_id),
                            "AttendanceIntegration",
                            integration.id,
                        )
                        .with_new(&report),
                    )
                    .await;
                Ok(report)
            }
            Err(e) => {
                error!(tenant_id = %integration.tenant_id, error = %e, "Attendance sync failed");
                integration.record_failure(&e.to_string());
                if let Err(save_err) = self.integrations.save(&integration).await {
                    warn!(tenant_id = %integration.tenant_id, error = %save_err, "Failed to record sync failure");
                }
                Err(e)
            }
        }
    }

    async fn sync_window(&self, integration: &AttendanceIntegration, now: DateTime<Utc>) -> Result<SyncReport, DomainError> {
        let start = integration
            .last_synced_at
            .unwrap_or_else(|| now - Duration::days(self.settings.lookback_days));
        let token = self
            .provider
            .authenticate(&integration.base_url, &integration.username, &integration.password)
            .await?;

        let mut report = SyncReport::default();
        let mut employees: HashMap<String, Option<Employee>> = HashMap::new();
        let mut affected: BTreeSet<(Uuid, NaiveDate)> = BTreeSet::new();
        let mut page = 1;

        loop {
            let query = TransactionQuery {
                page,
                page_size: self.settings.page_size,
                start_time: start.naive_utc(),
                end_time: now.naive_utc(),
            };
            let batch = self
                .provider
                .fetch_transactions(&integration.base_url, &token, query)
                .await?;
            report.fetched += batch.transactions.len();

            let unknown: Vec<String> = batch
                .transactions
                .iter()
                .map(|t| t.emp_code.clone())
                .filter(|code| !employees.contains_key(code))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if !unknown.is_empty() {
                let found = self.employees.find_by_codes(&integration.tenant_id, &unknown).await?;
                for code in unknown {
                    let employee = found.iter().find(|e| e.employee_code == code).cloned();
                    employees.insert(code, employee);
                }
            }

            for tx in &batch.transactions {
                let Some(Some(employee)) = employees.get(&tx.emp_code) else {
                    report.skipped += 1;
                    continue;
                };
                let punch = AttendancePunch::from_transaction(integration.tenant_id, employee.id, tx);
                if self.attendance.upsert_punch(&punch).await? {
                    report.created += 1;
                } else {
                    report.updated += 1;
                }
                affected.insert((employee.id, punch.work_date()));
            }

            if !batch.has_next || batch.transactions.is_empty() {
                break;
            }
            page += 1;
            if page > MAX_PAGES {
                warn!(tenant_id = %integration.tenant_id, "Attendance provider pagination limit reached");
                break;
            }
        }

        for (employee_id, work_date) in affected {
            if self.rebuild_day(&integration.tenant_id, &employee_id, work_date).await? {
                report.days_rebuilt += 1;
            }
        }
        Ok(report)
    }

    /// Recomputes a device record from its punches. Manual records are left alone.
    async fn rebuild_day(&self, tenant_id: &Uuid, employee_id: &Uuid, work_date: NaiveDate) -> Result<bool, DomainError> {
        let existing = self.attendance.find_for_day(tenant_id, employee_id, work_date).await?;
        if existing.as_ref().is_some_and(Attendance::is_manual) {
            return Ok(false);
        }
        let punches = self.attendance.punches_for_day(tenant_id, employee_id, work_date).await?;
        if punches.is_empty() {
            return Ok(false);
        }
        let record = match existing {
            Some(mut record) => {
                record.apply_punches(&punches);
                record
            }
            None => Attendance::from_punches(*tenant_id, *employee_id, work_date, &punches),
        };
        self.attendance.save(&record).await?;
        Ok(true)
    }
}
