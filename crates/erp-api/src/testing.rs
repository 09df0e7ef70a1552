//! Router fixtures backed by mock repositories.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Response, Router};
use erp_core::events::{EventDispatcher, MockWebhookSender, WebhookDeliverer};
use erp_core::repositories::{
    MockAttendanceIntegrationRepository, MockAttendanceRepository, MockAuditLogRepository, MockDealRepository,
    MockEmployeeRepository, MockInvoiceRepository, MockLeadRepository, MockNotificationRepository,
    MockProductRepository, MockReportRepository, MockRoleRepository, MockTenantRepository, MockUserRepository,
    MockWebhookRepository, MockWebsiteRepository, MockWorkflowRepository,
};
use erp_core::services::MockAttendanceProvider;
use erp_core::{SubscriptionPlan, Tenant, User};
use erp_security::JwtService;
use erp_shared::config::{AppSettings, AttendanceSettings, SecuritySettings};
use serde_json::Value;
use uuid::Uuid;

use crate::routes::build_router;
use crate::state::{AppState, ReadinessProbe, Repositories, Services};

pub const SECRET: &str = "router-test-secret-with-enough-bytes";

#[derive(Default)]
pub struct Mocks {
    pub tenants: MockTenantRepository,
    pub users: MockUserRepository,
    pub roles: MockRoleRepository,
    pub leads: MockLeadRepository,
    pub deals: MockDealRepository,
    pub products: MockProductRepository,
    pub invoices: MockInvoiceRepository,
    pub employees: MockEmployeeRepository,
    pub attendance: MockAttendanceRepository,
    pub integrations: MockAttendanceIntegrationRepository,
    pub websites: MockWebsiteRepository,
    pub notifications: MockNotificationRepository,
    pub audit_logs: MockAuditLogRepository,
    pub webhooks: MockWebhookRepository,
    pub workflows: MockWorkflowRepository,
    pub reports: MockReportRepository,
    pub provider: MockAttendanceProvider,
    pub sender: MockWebhookSender,
}

impl Mocks {
    /// Token validation resolves to `user`; every tenant lookup returns `tenant`.
    pub fn authenticate_as(&mut self, user: User, tenant: Tenant, grants: Vec<String>) {
        self.users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(user.clone())));
        self.users
            .expect_permissions_for()
            .returning(move |_| Ok(grants.clone()));
        self.tenants
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tenant.clone())));
    }
}

struct Ready(bool);

#[async_trait]
impl ReadinessProbe for Ready {
    async fn check(&self) -> Result<(), String> {
        if self.0 {
            Ok(())
        } else {
            Err("database unreachable".into())
        }
    }
}

pub fn jwt() -> JwtService {
    JwtService::new(SECRET, 900, 3600)
}

pub fn app(mocks: Mocks) -> Router {
    app_with(mocks, true, security(10, false))
}

pub fn security(login_attempts_per_minute: u32, trust_proxy_headers: bool) -> SecuritySettings {
    SecuritySettings {
        login_attempts_per_minute,
        trust_proxy_headers,
    }
}

pub fn app_with(mocks: Mocks, ready: bool, security: SecuritySettings) -> Router {
    let repos = Repositories {
        tenants: Arc::new(mocks.tenants),
        users: Arc::new(mocks.users),
        roles: Arc::new(mocks.roles),
        leads: Arc::new(mocks.leads),
        deals: Arc::new(mocks.deals),
        products: Arc::new(mocks.products),
        invoices: Arc::new(mocks.invoices),
        employees: Arc::new(mocks.employees),
        attendance: Arc::new(mocks.attendance),
        integrations: Arc::new(mocks.integrations),
        websites: Arc::new(mocks.websites),
        notifications: Arc::new(mocks.notifications),
        audit_logs: Arc::new(mocks.audit_logs),
        webhooks: Arc::new(mocks.webhooks),
        workflows: Arc::new(mocks.workflows),
        reports: Arc::new(mocks.reports),
    };
    let deliverer = WebhookDeliverer::new(Arc::new(mocks.sender), repos.webhooks.clone(), 1, 0);
    let settings = AttendanceSettings {
        page_size: 100,
        lookback_days: 1,
        request_timeout_seconds: 5,
    };
    let services = Services::build(
        &repos,
        jwt(),
        Arc::new(mocks.provider),
        deliverer,
        EventDispatcher::new(vec![]),
        settings,
    );
    let state = AppState::new(services, Arc::new(Ready(ready)), &security);

    let app_settings = AppSettings {
        env: "test".into(),
        host: "127.0.0.1".into(),
        port: 8080,
        name: "erp-test".into(),
        cors_origins: vec![],
    };
    build_router(state, &app_settings)
}

pub fn bearer(user: &User) -> String {
    let token = jwt()
        .generate_access_token(&user.id, user.tenant_id)
        .expect("token");
    format!("Bearer {}", token)
}

pub fn tenant() -> Tenant {
    Tenant::new(
        "Acme".into(),
        "acme".into(),
        10,
        SubscriptionPlan::Basic,
        "UTC".into(),
        None,
    )
    .expect("valid tenant")
}

pub fn user(tenant_id: Option<Uuid>) -> User {
    User::new(
        tenant_id,
        "Rina Sales".into(),
        "rina@acme.test".into(),
        "unused-hash".into(),
        None,
    )
    .expect("valid user")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
