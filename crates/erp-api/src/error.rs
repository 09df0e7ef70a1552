// ============================================================================
// ERP API - Error Mapping
// File: crates/erp-api/src/error.rs
// Description: Maps domain and request errors onto HTTP status + envelope
// ============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use erp_core::DomainError;
use serde_json::{Map, Value};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::response::ApiResponse;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type ApiCreated<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Domain(err) => domain_status(err),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        DomainError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
        DomainError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
        DomainError::UserNotActive => (StatusCode::FORBIDDEN, "USER_INACTIVE"),
        DomainError::TenantNotActive => (StatusCode::FORBIDDEN, "TENANT_INACTIVE"),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        DomainError::TenantRequired => (StatusCode::BAD_REQUEST, "TENANT_REQUIRED"),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        DomainError::InvalidStateTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE_TRANSITION")
        }
        DomainError::TenantMaxUsersReached => (StatusCode::UNPROCESSABLE_ENTITY, "TENANT_MAX_USERS_REACHED"),
        DomainError::PasswordTooShort | DomainError::PasswordTooLong | DomainError::PasswordTooWeak => {
            (StatusCode::UNPROCESSABLE_ENTITY, "WEAK_PASSWORD")
        }
        DomainError::ValidationError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        DomainError::ExternalServiceError(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR"),
        DomainError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        DomainError::PasswordHashError(_)
        | DomainError::TokenGenerationError(_)
        | DomainError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

/// Flattens nested validation errors into `{"items[0].quantity": ["range"]}`.
pub fn validation_details(errors: &ValidationErrors) -> Value {
    let mut out = Map::new();
    collect(errors, "", &mut out);
    Value::Object(out)
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Map<String, Value>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = list
                    .iter()
                    .map(|e| {
                        let text = match &e.message {
                            Some(message) => message.to_string(),
                            None => e.code.to_string(),
                        };
                        Value::String(text)
                    })
                    .collect();
                out.insert(path, Value::Array(messages));
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, details) = match &self {
            ApiError::Validation(errors) => {
                tracing::warn!("Validation failed: {}", errors);
                ("The given data was invalid".to_string(), Some(validation_details(errors)))
            }
            ApiError::Domain(DomainError::DatabaseError(msg)) => {
                tracing::error!("Database error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            ApiError::Domain(
                DomainError::InternalError(msg)
                | DomainError::PasswordHashError(msg)
                | DomainError::TokenGenerationError(msg),
            ) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            ApiError::Domain(DomainError::ExternalServiceError(msg)) => {
                tracing::error!("External service error: {}", msg);
                (self.to_string(), None)
            }
            ApiError::Unavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (self.to_string(), None)
            }
            other => {
                tracing::warn!("{}: {}", code, other);
                (other.to_string(), None)
            }
        };

        (status, Json(ApiResponse::error(code, &message, details))).into_response()
    }
}
