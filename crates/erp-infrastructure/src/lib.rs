//! # ERP Infrastructure
//! 
//! PostgreSQL repositories and outbound HTTP clients (adapters).

pub mod database;
pub mod http;

pub use database::{create_pool, ping, run_migrations};
pub use database::postgres::{
    PgAttendanceIntegrationRepository, PgAttendanceRepository, PgAuditLogRepository, PgDealRepository,
    PgEmployeeRepository, PgInvoiceRepository, PgLeadRepository, PgNotificationRepository,
    PgProductRepository, PgReportRepository, PgRoleRepository, PgTenantRepository, PgUserRepository,
    PgWebhookRepository, PgWebsiteRepository, PgWorkflowRepository,
};
pub use http::{HttpWebhookSender, ZkBioTimeClient};
