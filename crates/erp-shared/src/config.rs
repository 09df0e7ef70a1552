//! Configuration management

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::MIN_JWT_SECRET_LENGTH;
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub security: SecuritySettings,
    pub webhooks: WebhookSettings,
    pub attendance: AttendanceSettings,
    pub scheduler: SchedulerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecuritySettings {
    pub login_attempts_per_minute: u32,
    /// Take the client IP from `X-Forwarded-For`/`X-Real-IP`. Only enable
    /// behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookSettings {
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttendanceSettings {
    pub page_size: u32,
    pub lookback_days: i64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub attendance_sync_interval_minutes: u64,
    pub overdue_check_interval_minutes: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub format: String,
    pub directory: Option<String>,
}

impl AppConfig {
    /// Load defaults, then `config/default`, `config/{APP_ENV}`, then `APP_*` env vars.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let config = Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("app.cors_origins")
                    .try_parsing(true),
            )
            .build()?;
        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("app.env", "development")?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.name", "erp-server")?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_seconds", 3)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.access_token_expiry", crate::constants::DEFAULT_ACCESS_TOKEN_EXPIRY)?
            .set_default("jwt.refresh_token_expiry", crate::constants::DEFAULT_REFRESH_TOKEN_EXPIRY)?
            .set_default("security.login_attempts_per_minute", 10)?
            .set_default("security.trust_proxy_headers", false)?
            .set_default("webhooks.timeout_seconds", 10)?
            .set_default("webhooks.max_attempts", 3)?
            .set_default("webhooks.backoff_base_ms", 500)?
            .set_default("attendance.page_size", 100)?
            .set_default("attendance.lookback_days", 1)?
            .set_default("attendance.request_timeout_seconds", 30)?
            .set_default("scheduler.attendance_sync_interval_minutes", 15)?
            .set_default("scheduler.overdue_check_interval_minutes", 60)?
            .set_default("logging.format", "pretty")
    }

    pub fn is_development(&self) -> bool {
        self.app.env == "development"
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.app.port == 0 {
            return Err(AppError::InvalidConfig("app.port must not be 0".into()));
        }
        if !self.is_development() && self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(AppError::InvalidConfig(format!(
                "jwt.secret must be at least {} bytes outside development",
                MIN_JWT_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(AppError::InvalidConfig("jwt expiries must be positive".into()));
        }
        if self.security.login_attempts_per_minute == 0 {
            return Err(AppError::InvalidConfig(
                "security.login_attempts_per_minute must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        let config = AppConfig::builder()
            .unwrap()
            .set_override("database.url", "postgres://localhost/erp")
            .unwrap()
            .set_override("jwt.secret", "dev-secret")
            .unwrap()
            .build()
            .unwrap();
        config.try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults_deserialize() {
        let cfg = sample();
        assert_eq!(cfg.app.port, 8080);
        assert_eq!(cfg.webhooks.max_attempts, 3);
        assert_eq!(cfg.attendance.page_size, 100);
        assert!(!cfg.security.trust_proxy_headers);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected_in_production() {
        let mut cfg = sample();
        cfg.app.env = "production".into();
        assert!(matches!(cfg.validate(), Err(AppError::InvalidConfig(_))));

        cfg.jwt.secret = "x".repeat(MIN_JWT_SECRET_LENGTH);
        assert!(cfg.validate().is_ok());
    }
}
