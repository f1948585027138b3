use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_config::{load as load_config, AppConfig};
use parley_runtime::{telemetry, BackendServices};
use tracing::info;

#[derive(Parser)]
#[command(name = "parleyctl")]
#[command(about = "Parley backend maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,
    /// Repair drift between chat member lists and user chat indexes
    Reconcile,
    /// Delete expired sessions
    PurgeSessions,
    /// Print row counts per table
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config().context("failed to load configuration")?;
    telemetry::init_tracing(&config.logging.filter).context("failed to initialise tracing")?;

    match cli.command {
        Commands::Migrate => migrate(&config).await,
        Commands::Reconcile => reconcile(&config).await,
        Commands::PurgeSessions => purge_sessions(&config).await,
        Commands::Stats => stats(&config).await,
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    connect(config).await?;
    info!(database = %config.database.url, "schema up to date");
    println!("Migrations applied to {}", config.database.url);
    Ok(())
}

async fn reconcile(config: &AppConfig) -> anyhow::Result<()> {
    let services = connect(config).await?;
    let report = services.reconcile_memberships().await?;

    if report.is_clean() {
        println!("Memberships consistent, nothing to repair");
    } else {
        println!("Reconciliation finished:");
        println!("- {} index entries added", report.added);
        println!("- {} index entries removed", report.removed);
        println!("- {} members without a user record", report.unknown_members);
    }
    Ok(())
}

async fn purge_sessions(config: &AppConfig) -> anyhow::Result<()> {
    let services = connect(config).await?;
    let purged = services.purge_expired_sessions().await?;
    println!("{purged} expired sessions deleted");
    Ok(())
}

async fn stats(config: &AppConfig) -> anyhow::Result<()> {
    let services = connect(config).await?;

    println!("{:<16} {:>10}", "Table", "Rows");
    println!("{}", "-".repeat(27));
    for table in ["users", "chats", "chat_members", "user_chats", "messages", "sessions"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&services.db_pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        println!("{table:<16} {count:>10}");
    }
    Ok(())
}
