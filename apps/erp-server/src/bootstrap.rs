//! Wires PostgreSQL repositories, outbound clients and event listeners into services.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use erp_api::{ReadinessProbe, Repositories, Services};
use erp_core::events::{
    AuditListener, EventListener, NotificationListener, WebhookDeliverer, WebhookListener, WebhookSender,
};
use erp_core::workflow::WorkflowListener;
use erp_infrastructure::{
    create_pool, run_migrations, HttpWebhookSender, PgAttendanceIntegrationRepository, PgAttendanceRepository,
    PgAuditLogRepository, PgDealRepository, PgEmployeeRepository, PgInvoiceRepository, PgLeadRepository,
    PgNotificationRepository, PgProductRepository, PgReportRepository, PgRoleRepository, PgTenantRepository,
    PgUserRepository, PgWebhookRepository, PgWebsiteRepository, PgWorkflowRepository, ZkBioTimeClient,
};
use erp_security::JwtService;
use erp_shared::config::AppConfig;
use sqlx::PgPool;
use tracing::info;

pub struct Runtime {
    pub pool: PgPool,
    pub services: Services,
}

pub async fn connect(config: &AppConfig) -> Result<PgPool> {
    let pool = create_pool(&config.database).await?;
    info!(max_connections = config.database.max_connections, "Database connection established");
    Ok(pool)
}

/// Connects, optionally migrates, and builds every service.
pub async fn runtime(config: &AppConfig) -> Result<Runtime> {
    let pool = connect(config).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    let services = services(config, pool.clone())?;
    Ok(Runtime { pool, services })
}

pub fn repositories(pool: PgPool) -> Repositories {
    Repositories {
        tenants: Arc::new(PgTenantRepository::new(pool.clone())),
        users: Arc::new(PgUserRepository::new(pool.clone())),
        roles: Arc::new(PgRoleRepository::new(pool.clone())),
        leads: Arc::new(PgLeadRepository::new(pool.clone())),
        deals: Arc::new(PgDealRepository::new(pool.clone())),
        products: Arc::new(PgProductRepository::new(pool.clone())),
        invoices: Arc::new(PgInvoiceRepository::new(pool.clone())),
        employees: Arc::new(PgEmployeeRepository::new(pool.clone())),
        attendance: Arc::new(PgAttendanceRepository::new(pool.clone())),
        integrations: Arc::new(PgAttendanceIntegrationRepository::new(pool.clone())),
        websites: Arc::new(PgWebsiteRepository::new(pool.clone())),
        notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
        audit_logs: Arc::new(PgAuditLogRepository::new(pool.clone())),
        webhooks: Arc::new(PgWebhookRepository::new(pool.clone())),
        workflows: Arc::new(PgWorkflowRepository::new(pool.clone())),
        reports: Arc::new(PgReportRepository::new(pool)),
    }
}

pub fn services(config: &AppConfig, pool: PgPool) -> Result<Services> {
    let repos = repositories(pool);

    let sender: Arc<dyn WebhookSender> = Arc::new(HttpWebhookSender::new(config.webhooks.timeout_seconds)?);
    let deliverer = WebhookDeliverer::new(
        sender.clone(),
        repos.webhooks.clone(),
        config.webhooks.max_attempts,
        config.webhooks.backoff_base_ms,
    );

    let listeners: Vec<Arc<dyn EventListener>> = vec![
        Arc::new(AuditListener::new(repos.audit_logs.clone())),
        Arc::new(NotificationListener::new(repos.notifications.clone())),
        Arc::new(WebhookListener::new(repos.webhooks.clone(), deliverer.clone())),
    ];
    let events = WorkflowListener::dispatcher(
        listeners,
        repos.workflows.clone(),
        repos.leads.clone(),
        repos.notifications.clone(),
        sender,
    );

    let jwt = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
        config.jwt.refresh_token_expiry,
    );
    let provider = Arc::new(ZkBioTimeClient::new(config.attendance.request_timeout_seconds)?);

    Ok(Services::build(
        &repos,
        jwt,
        provider,
        deliverer,
        events,
        config.attendance.clone(),
    ))
}

/// Readiness backed by a `SELECT 1` on the pool.
pub struct PgReadiness {
    pool: PgPool,
}

impl PgReadiness {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadinessProbe for PgReadiness {
    async fn check(&self) -> Result<(), String> {
        erp_infrastructure::ping(&self.pool)
            .await
            .map_err(|e| e.to_string())
    }
}
