use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use erp_shared::config::AppConfig;
use erp_shared::telemetry::init_telemetry;
use tracing::{error, info};
use uuid::Uuid;

mod bootstrap;
mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "erp-server",
    version,
    about = "Multi-tenant ERP/CRM backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Pull punches from the attendance provider
    AttendanceSync {
        /// Only this tenant's integration
        #[arg(long)]
        tenant: Option<Uuid>,
    },

    /// Flag issued invoices past their due date
    InvoicesMarkOverdue {
        /// Reference date, YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Database ping plus attendance API login per enabled integration
    HealthCheck,

    /// Run attendance sync and overdue checks on their configured intervals
    Schedule,

    /// Apply database migrations and exit
    Migrate,

    /// Create a platform super admin with no tenant. The password is read
    /// from ERP_SUPER_ADMIN_PASSWORD
    CreateSuperAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let guard = init_telemetry(&config.logging)?;
    info!(name = %config.app.name, env = %config.app.env, "Configuration loaded");

    let ok = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::serve(&config, runtime.pool, runtime.services).await?;
            true
        }
        Command::AttendanceSync { tenant } => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::attendance_sync(&runtime.services, tenant).await?
        }
        Command::InvoicesMarkOverdue { date } => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::invoices_mark_overdue(&runtime.services, date).await?;
            true
        }
        Command::HealthCheck => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::health_check(&runtime.pool, &runtime.services).await?
        }
        Command::Schedule => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::schedule(&config, &runtime.services).await?;
            true
        }
        Command::CreateSuperAdmin { email, name } => {
            let runtime = bootstrap::runtime(&config).await?;
            commands::create_super_admin(&runtime.services, email, name).await?;
            true
        }
        Command::Migrate => {
            let pool = bootstrap::connect(&config).await?;
            erp_infrastructure::run_migrations(&pool).await?;
            info!("Migrations applied");
            true
        }
    };

    if !ok {
        error!("Command finished with failures");
        drop(guard);
        std::process::exit(1);
    }
    drop(guard);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["erp-server"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_parses_attendance_sync_tenant() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["erp-server", "attendance-sync", "--tenant", &id.to_string()]).unwrap();
        assert_eq!(cli.command, Some(Command::AttendanceSync { tenant: Some(id) }));
    }

    #[test]
    fn test_parses_overdue_date() {
        let cli = Cli::try_parse_from(["erp-server", "invoices-mark-overdue", "--date", "2024-05-01"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::InvoicesMarkOverdue {
                date: NaiveDate::from_ymd_opt(2024, 5, 1)
            })
        );
    }

    #[test]
    fn test_rejects_bad_tenant_id() {
        assert!(Cli::try_parse_from(["erp-server", "attendance-sync", "--tenant", "acme"]).is_err());
    }

    #[test]
    fn test_parses_create_super_admin() {
        let cli = Cli::try_parse_from([
            "erp-server",
            "create-super-admin",
            "--email",
            "ops@platform.io",
            "--name",
            "Platform Ops",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::CreateSuperAdmin {
                email: "ops@platform.io".into(),
                name: "Platform Ops".into(),
            })
        );
        assert!(Cli::try_parse_from(["erp-server", "create-super-admin", "--email", "ops@platform.io"]).is_err());
    }

    #[test]
    fn test_health_check_and_migrate_subcommands() {
        let cli = Cli::try_parse_from(["erp-server", "health-check"]).unwrap();
        assert_eq!(cli.command, Some(Command::HealthCheck));
        let cli = Cli::try_parse_from(["erp-server", "migrate"]).unwrap();
        assert_eq!(cli.command, Some(Command::Migrate));
    }
}
