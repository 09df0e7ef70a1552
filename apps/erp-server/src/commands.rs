//! Console commands. Each returns whether it succeeded so `main` can set the exit status.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use erp_api::{build_router, AppState, Services};
use erp_core::services::invoice_service::mark_overdue_all;
use erp_core::services::user_service::CreateSuperAdminInput;
use erp_core::services::SyncReport;
use erp_core::{DomainError, RequestContext, TenantScope};
use erp_shared::config::AppConfig;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bootstrap::PgReadiness;

pub async fn serve(config: &AppConfig, pool: PgPool, services: Services) -> Result<()> {
    let state = AppState::new(
        services,
        Arc::new(PgReadiness::new(pool)),
        &config.security,
    );
    let app = build_router(state, &config.app);

    let addr = SocketAddr::from((config.app.host.parse::<std::net::IpAddr>()?, config.app.port));
    info!(
        %addr,
        env = %config.app.env,
        trust_proxy_headers = config.security.trust_proxy_headers,
        "Server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received shutdown signal");
}

/// Sync one tenant or every enabled integration. `false` when any integration failed.
pub async fn attendance_sync(services: &Services, tenant: Option<Uuid>) -> Result<bool> {
    let results = match tenant {
        Some(tenant_id) => {
            let ctx = RequestContext::system(TenantScope::Tenant(tenant_id));
            vec![(tenant_id, services.attendance_sync.sync_tenant(&ctx, tenant_id).await)]
        }
        None => services.attendance_sync.sync_all().await?,
    };
    Ok(report_sync(&results))
}

fn report_sync(results: &[(Uuid, Result<SyncReport, DomainError>)]) -> bool {
    let mut failed = 0usize;
    for (tenant_id, result) in results {
        match result {
            Ok(report) => info!(
                %tenant_id,
                fetched = report.fetched,
                created = report.created,
                updated = report.updated,
                skipped = report.skipped,
                days_rebuilt = report.days_rebuilt,
                "Attendance sync finished"
            ),
            Err(e) => {
                failed += 1;
                error!(%tenant_id, error = %e, "Attendance sync failed");
            }
        }
    }
    info!(total = results.len(), failed, "Attendance sync run complete");
    failed == 0
}

pub async fn invoices_mark_overdue(services: &Services, date: Option<NaiveDate>) -> Result<usize> {
    let today = date.unwrap_or_else(|| Utc::now().date_naive());
    let updated = mark_overdue_all(&services.invoices, today).await?;
    info!(%today, updated, "Marked overdue invoices");
    Ok(updated)
}

pub const SUPER_ADMIN_PASSWORD_ENV: &str = "ERP_SUPER_ADMIN_PASSWORD";

/// Bootstraps the first platform operator, tenantless and attributed to the system actor.
pub async fn create_super_admin(services: &Services, email: String, name: String) -> Result<()> {
    let password = super_admin_password(|key| std::env::var(key).ok())?;
    let ctx = RequestContext::system(TenantScope::All);
    let user = services
        .users
        .create_super_admin(&ctx, CreateSuperAdminInput { name, email, password })
        .await?;
    info!(user_id = %user.id, email = %user.email, "Super admin created");
    Ok(())
}

fn super_admin_password(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    lookup(SUPER_ADMIN_PASSWORD_ENV)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| anyhow!("set {} to the new account's password", SUPER_ADMIN_PASSWORD_ENV))
}

/// Database ping plus provider authentication for every enabled integration.
pub async fn health_check(pool: &PgPool, services: &Services) -> Result<bool> {
    let mut healthy = true;

    match erp_infrastructure::ping(pool).await {
        Ok(()) => info!("Database reachable"),
        Err(e) => {
            error!(error = %e, "Database unreachable");
            return Ok(false);
        }
    }

    for integration in services.attendance_sync.enabled_integrations().await? {
        match services.attendance_sync.check_connection(&integration).await {
            Ok(()) => info!(tenant_id = %integration.tenant_id, "Attendance API reachable"),
            Err(e) => {
                healthy = false;
                error!(tenant_id = %integration.tenant_id, error = %e, "Attendance API check failed");
            }
        }
    }
    Ok(healthy)
}

/// Runs attendance sync and the overdue check on their own intervals until ctrl-c.
pub async fn schedule(config: &AppConfig, services: &Services) -> Result<()> {
    let mut sync_tick = tokio::time::interval(minutes(config.scheduler.attendance_sync_interval_minutes));
    let mut overdue_tick = tokio::time::interval(minutes(config.scheduler.overdue_check_interval_minutes));
    sync_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    overdue_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(
        sync_minutes = config.scheduler.attendance_sync_interval_minutes,
        overdue_minutes = config.scheduler.overdue_check_interval_minutes,
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = sync_tick.tick() => {
                match attendance_sync(services, None).await {
                    Ok(true) => {}
                    Ok(false) => warn!("Scheduled attendance sync had failures"),
                    Err(e) => error!(error = %e, "Scheduled attendance sync failed"),
                }
            }
            _ = overdue_tick.tick() => {
                if let Err(e) = invoices_mark_overdue(services, None).await {
                    error!(error = %e, "Scheduled overdue check failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Scheduler stopped");
    Ok(())
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.max(1) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SyncReport {
        SyncReport {
            fetched: 3,
            created: 2,
            updated: 1,
            skipped: 0,
            days_rebuilt: 1,
        }
    }

    #[test]
    fn test_report_sync_all_ok() {
        let results = vec![(Uuid::new_v4(), Ok(report())), (Uuid::new_v4(), Ok(report()))];
        assert!(report_sync(&results));
    }

    #[test]
    fn test_report_sync_any_failure_fails_run() {
        let results = vec![
            (Uuid::new_v4(), Ok(report())),
            (Uuid::new_v4(), Err(DomainError::ExternalServiceError("timeout".into()))),
        ];
        assert!(!report_sync(&results));
    }

    #[test]
    fn test_report_sync_empty_is_success() {
        assert!(report_sync(&[]));
    }

    #[test]
    fn test_super_admin_password_comes_from_env() {
        let password = super_admin_password(|key| {
            (key == SUPER_ADMIN_PASSWORD_ENV).then(|| "plum-orbit-Kettle-92!".to_string())
        })
        .unwrap();
        assert_eq!(password, "plum-orbit-Kettle-92!");
    }

    #[test]
    fn test_super_admin_password_required() {
        assert!(super_admin_password(|_| None).is_err());
        assert!(super_admin_password(|_| Some("  ".into())).is_err());
    }

    #[test]
    fn test_minutes_floor_at_one() {
        assert_eq!(minutes(0), Duration::from_secs(60));
        assert_eq!(minutes(15), Duration::from_secs(900));
    }
}
