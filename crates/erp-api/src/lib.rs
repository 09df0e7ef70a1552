//! # ERP API
//!
//! HTTP handlers, middleware, DTOs, response envelope and router.

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::ApiError;
pub use routes::build_router;
pub use state::{AppState, LoginLimiter, ReadinessProbe, Repositories, Services};
