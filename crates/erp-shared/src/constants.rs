//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 900;
pub const DEFAULT_REFRESH_TOKEN_EXPIRY: i64 = 604800;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
pub const TENANT_HEADER: &str = "X-Tenant-ID";
pub const WEBHOOK_EVENT_HEADER: &str = "X-Webhook-Event";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
