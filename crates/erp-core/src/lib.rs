//! # ERP Core
//! 
//! Domain entities, services, and repository traits for the ERP application.

pub mod authorization;
pub mod context;
pub mod domain;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod tenancy;
pub mod workflow;

// Re-export domain entities
pub use context::{RequestContext, RequestMeta};
pub use domain::*;
pub use error::DomainError;
pub use tenancy::TenantScope;
