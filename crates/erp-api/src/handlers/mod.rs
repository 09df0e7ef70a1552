//! HTTP handlers grouped by module

pub mod attendance;
pub mod audit;
pub mod auth;
pub mod crm;
pub mod health;
pub mod notifications;
pub mod reports;
pub mod roles;
pub mod sales;
pub mod tenants;
pub mod users;
pub mod webhooks;
pub mod websites;
pub mod workflows;
