// ============================================================================
// ERP API - Router
// File: crates/erp-api/src/routes.rs
// Description: Public and authenticated routes under /api/v1
// ============================================================================

use std::time::Duration;

use axum::{
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{get, post, put},
    Router,
};
use erp_shared::config::AppSettings;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::{
    attendance, audit, auth, crm, health, notifications, reports, roles, sales, tenants, users, webhooks, websites,
    workflows,
};
use crate::middleware::require_auth;
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(state: AppState, settings: &AppSettings) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/public/sites/{domain}/pages/{slug}", get(websites::public_page));

    let protected_routes = Router::new()
        // Auth
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/permissions", get(auth::permissions))
        // Tenants
        .route("/tenants", get(tenants::list).post(tenants::create))
        .route("/tenants/{id}", get(tenants::get).put(tenants::update).delete(tenants::delete))
        .route("/tenants/{id}/activate", post(tenants::activate))
        .route("/tenants/{id}/suspend", post(tenants::suspend))
        // Users & roles
        .route("/users", get(users::list).post(users::create))
        .route("/users/{id}", get(users::get).put(users::update).delete(users::delete))
        .route("/users/{id}/roles", put(users::assign_roles))
        .route("/roles", get(roles::list).post(roles::create))
        .route("/roles/{id}", get(roles::get).put(roles::update).delete(roles::delete))
        .route("/roles/{id}/permissions", put(roles::set_permissions))
        // CRM
        .route("/leads", get(crm::list_leads).post(crm::create_lead))
        .route("/leads/{id}", get(crm::get_lead).put(crm::update_lead).delete(crm::delete_lead))
        .route("/leads/{id}/status", post(crm::change_lead_status))
        .route("/leads/{id}/assign", post(crm::assign_lead))
        .route("/leads/{id}/convert", post(crm::convert_lead))
        .route("/deals", get(crm::list_deals).post(crm::create_deal))
        .route("/deals/{id}", get(crm::get_deal).put(crm::update_deal).delete(crm::delete_deal))
        .route("/deals/{id}/stage", post(crm::change_deal_stage))
        // Sales
        .route("/products", get(sales::list_products).post(sales::create_product))
        .route(
            "/products/{id}",
            get(sales::get_product).put(sales::update_product).delete(sales::delete_product),
        )
        .route("/invoices", get(sales::list_invoices).post(sales::create_invoice))
        .route(
            "/invoices/{id}",
            get(sales::get_invoice).put(sales::update_invoice).delete(sales::delete_invoice),
        )
        .route("/invoices/{id}/issue", post(sales::issue_invoice))
        .route("/invoices/{id}/void", post(sales::void_invoice))
        .route("/invoices/{id}/payments", get(sales::list_payments).post(sales::record_payment))
        .route("/payments/{id}", axum::routing::delete(sales::delete_payment))
        // HR
        .route("/employees", get(attendance::list_employees).post(attendance::create_employee))
        .route(
            "/employees/{id}",
            get(attendance::get_employee)
                .put(attendance::update_employee)
                .delete(attendance::delete_employee),
        )
        .route("/attendance", get(attendance::list_attendance).post(attendance::create_attendance))
        .route("/attendance/punches", get(attendance::list_punches))
        .route("/attendance/sync", post(attendance::sync))
        .route(
            "/attendance/integration",
            get(attendance::get_integration).put(attendance::save_integration),
        )
        .route("/attendance/{id}", get(attendance::get_attendance).put(attendance::update_attendance))
        // Website
        .route("/websites", get(websites::list_sites).post(websites::create_site))
        .route(
            "/websites/{id}",
            get(websites::get_site).put(websites::update_site).delete(websites::delete_site),
        )
        .route("/websites/{id}/pages", get(websites::list_pages).post(websites::create_page))
        .route(
            "/pages/{id}",
            get(websites::get_page).put(websites::update_page).delete(websites::delete_page),
        )
        .route("/pages/{id}/publish", post(websites::publish_page))
        .route("/pages/{id}/unpublish", post(websites::unpublish_page))
        // Notifications & audit
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/audit-logs", get(audit::list))
        // Automation
        .route("/webhooks", get(webhooks::list).post(webhooks::create))
        .route("/webhooks/{id}", get(webhooks::get).put(webhooks::update).delete(webhooks::delete))
        .route("/webhooks/{id}/deliveries", get(webhooks::deliveries))
        .route("/webhooks/{id}/test", post(webhooks::test))
        .route("/workflows", get(workflows::list).post(workflows::create))
        .route("/workflows/{id}", get(workflows::get).put(workflows::update).delete(workflows::delete))
        .route("/workflows/{id}/activate", post(workflows::activate))
        .route("/workflows/{id}/deactivate", post(workflows::deactivate))
        // Reports
        .route("/reports/pipeline", get(reports::pipeline))
        .route("/reports/lead-conversion", get(reports::lead_conversion))
        .route("/reports/invoice-aging", get(reports::invoice_aging))
        .route("/reports/attendance-summary", get(reports::attendance_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/api/v1", public_routes.merge(protected_routes))
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors_layer(&settings.cors_origins))
}

/// An empty list or `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}
