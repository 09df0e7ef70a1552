//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not active")]
    UserNotActive,

    #[error("Tenant not active")]
    TenantNotActive,

    #[error("A tenant must be selected for this operation")]
    TenantRequired,

    #[error("Tenant max users reached")]
    TenantMaxUsersReached,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} with {field} '{value}' already exists")]
    AlreadyExists {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Password too long")]
    PasswordTooLong,

    #[error("Password too weak")]
    PasswordTooWeak,

    #[error("Password hash error: {0}")]
    PasswordHashError(String),

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        DomainError::AlreadyExists {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        DomainError::InvalidStateTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(errors.to_string())
    }
}

impl From<erp_security::PasswordError> for DomainError {
    fn from(err: erp_security::PasswordError) -> Self {
        use erp_security::PasswordError;
        match err {
            PasswordError::TooShort => DomainError::PasswordTooShort,
            PasswordError::TooLong => DomainError::PasswordTooLong,
            PasswordError::TooWeak => DomainError::PasswordTooWeak,
            PasswordError::VerificationFailed => DomainError::InvalidCredentials,
            PasswordError::HashError(msg) => DomainError::PasswordHashError(msg),
        }
    }
}

impl From<erp_security::JwtError> for DomainError {
    fn from(err: erp_security::JwtError) -> Self {
        use erp_security::JwtError;
        match err {
            JwtError::CreationError(msg) => DomainError::TokenGenerationError(msg),
            JwtError::TokenExpired => DomainError::TokenExpired,
            JwtError::ValidationError(msg) => DomainError::InvalidToken(msg),
            JwtError::WrongTokenType(kind) => {
                DomainError::InvalidToken(format!("unexpected token type {}", kind))
            }
        }
    }
}
