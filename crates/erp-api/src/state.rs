use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use erp_core::events::{EventDispatcher, WebhookDeliverer};
use erp_core::repositories::{
    AttendanceIntegrationRepository, AttendanceRepository, AuditLogRepository, DealRepository, EmployeeRepository,
    InvoiceRepository, LeadRepository, NotificationRepository, ProductRepository, ReportRepository, RoleRepository,
    TenantRepository, UserRepository, WebhookRepository, WebsiteRepository, WorkflowRepository,
};
use erp_core::services::{
    AttendanceProvider, AttendanceService, AttendanceSyncService, AuditService, AuthService, DealService,
    EmployeeService, InvoiceService, LeadService, NotificationService, ProductService, ReportService, RoleService,
    TenantService, UserService, WebhookService, WebsiteService, WorkflowService,
};
use erp_security::JwtService;
use erp_shared::config::{AttendanceSettings, SecuritySettings};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

/// Dependency check behind `GET /health/ready`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self) -> Result<(), String>;
}

/// Checks between sweeps of keys whose quota has fully replenished.
const PRUNE_EVERY: u64 = 1024;

/// Login attempts per client IP per minute.
pub struct LoginLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
}

impl LoginLimiter {
    pub fn per_minute(attempts: u32) -> Self {
        let burst = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(burst)),
            checks: AtomicU64::new(0),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Drops idle keys so one-off client addresses do not accumulate.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

pub struct Services {
    pub auth: AuthService,
    pub tenants: TenantService,
    pub users: UserService,
    pub roles: RoleService,
    pub leads: LeadService,
    pub deals: DealService,
    pub products: ProductService,
    pub invoices: InvoiceService,
    pub employees: EmployeeService,
    pub attendance: AttendanceService,
    pub attendance_sync: AttendanceSyncService,
    pub websites: WebsiteService,
    pub notifications: NotificationService,
    pub audit: AuditService,
    pub webhooks: WebhookService,
    pub workflows: WorkflowService,
    pub reports: ReportService,
}

/// Repository ports the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub tenants: Arc<dyn TenantRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub deals: Arc<dyn DealRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub employees: Arc<dyn EmployeeRepository>,
    pub attendance: Arc<dyn AttendanceRepository>,
    pub integrations: Arc<dyn AttendanceIntegrationRepository>,
    pub websites: Arc<dyn WebsiteRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub reports: Arc<dyn ReportRepository>,
}

impl Services {
    pub fn build(
        repos: &Repositories,
        jwt: JwtService,
        provider: Arc<dyn AttendanceProvider>,
        deliverer: WebhookDeliverer,
        events: EventDispatcher,
        attendance: AttendanceSettings,
    ) -> Self {
        Self {
            auth: AuthService::new(repos.users.clone(), repos.tenants.clone(), jwt, events.clone()),
            tenants: TenantService::new(repos.tenants.clone(), repos.roles.clone(), repos.users.clone(), events.clone()),
            users: UserService::new(repos.users.clone(), repos.roles.clone(), repos.tenants.clone(), events.clone()),
            roles: RoleService::new(repos.roles.clone(), events.clone()),
            leads: LeadService::new(repos.leads.clone(), repos.users.clone(), events.clone()),
            deals: DealService::new(repos.deals.clone(), events.clone()),
            products: ProductService::new(repos.products.clone(), events.clone()),
            invoices: InvoiceService::new(repos.invoices.clone(), repos.products.clone(), events.clone()),
            employees: EmployeeService::new(repos.employees.clone(), repos.users.clone(), events.clone()),
            attendance: AttendanceService::new(
                repos.attendance.clone(),
                repos.employees.clone(),
                repos.integrations.clone(),
                events.clone(),
            ),
            attendance_sync: AttendanceSyncService::new(
                repos.integrations.clone(),
                repos.employees.clone(),
                repos.attendance.clone(),
                provider,
                events.clone(),
                attendance,
            ),
            websites: WebsiteService::new(repos.websites.clone(), events.clone()),
            notifications: NotificationService::new(repos.notifications.clone()),
            audit: AuditService::new(repos.audit_logs.clone()),
            webhooks: WebhookService::new(repos.webhooks.clone(), deliverer, events.clone()),
            workflows: WorkflowService::new(repos.workflows.clone(), events),
            reports: ReportService::new(repos.reports.clone()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub readiness: Arc<dyn ReadinessProbe>,
    pub login_limiter: Arc<LoginLimiter>,
    /// Whether client IPs come from proxy headers or the socket peer.
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(services: Services, readiness: Arc<dyn ReadinessProbe>, security: &SecuritySettings) -> Self {
        Self {
            services: Arc::new(services),
            readiness,
            login_limiter: Arc::new(LoginLimiter::per_minute(security.login_attempts_per_minute)),
            trust_proxy_headers: security.trust_proxy_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_limiter_blocks_after_quota() {
        let limiter = LoginLimiter::per_minute(2);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_prune_keeps_exhausted_keys() {
        let limiter = LoginLimiter::per_minute(1);
        assert!(limiter.check("10.0.0.1"));
        limiter.prune();
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_check_sweeps_periodically() {
        let limiter = LoginLimiter::per_minute(1);
        for i in 0..PRUNE_EVERY {
            limiter.check(&format!("198.51.100.{}", i));
        }
        // Every key above is still inside its window, so the sweep keeps them.
        assert_eq!(limiter.tracked_keys(), PRUNE_EVERY as usize);
    }
}
