use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pettag_core::config::Config;
use pettag_core::services::billing::parse_payment_results;
use pettag_core::AppState;

#[derive(Parser)]
#[command(name = "pettag-core")]
#[command(about = "Pet Tag Registry - registration, tag lifecycle and debit-order billing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Billing runs
    #[command(subcommand)]
    Billing(BillingCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum BillingCommands {
    /// Write the debit-order file for every paid pet
    Export,

    /// Apply a bank results file
    Import {
        /// Results CSV with Customer_ID and Status columns
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Apply the yearly fee increase
    AdjustFees {
        /// Increase in percent, e.g. 10 or 7.5
        #[arg(value_name = "PERCENTAGE", allow_hyphen_values = true)]
        percentage: String,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(database_url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL must be set to run migrations");
    };

    let pool = pettag_core::db::create_pool(database_url).await?;
    tracing::info!("Running database migrations...");
    pettag_core::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_billing_export(state: &AppState) -> anyhow::Result<()> {
    let manifest = state.billing.generate_billing_batch().await?;

    println!("✓ Billing file written:");
    println!("  Batch: {}", manifest.batch_id);
    println!("  File: {}", manifest.download_path);
    println!("  Customers: {}", manifest.customer_count);
    println!("  Total: {}", manifest.total_amount);
    Ok(())
}

pub async fn handle_billing_import(state: &AppState, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let results = parse_payment_results(bytes.as_slice())?;
    let summary = state.billing.import_payment_results(&results).await?;
    state.notifications.drain().await;

    println!("✓ Payment results imported:");
    println!("  Paid: {}", summary.updated_count);
    println!("  Failed: {}", summary.failed_count);
    println!("  Skipped: {}", summary.skipped_count);
    Ok(())
}

pub async fn handle_billing_adjust_fees(state: &AppState, percentage: &str) -> anyhow::Result<()> {
    let percentage = BigDecimal::from_str(percentage.trim())
        .map_err(|_| anyhow::anyhow!("PERCENTAGE must be a number, got '{}'", percentage))?;
    let adjustment = state.billing.apply_annual_fee_adjustment(percentage).await?;

    println!(
        "✓ Fees adjusted by {}% on {} pets",
        adjustment.percentage, adjustment.affected_count
    );
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: <unset, in-memory store>"),
    }
    println!("  Storage Root: {}", config.storage_root);
    println!("  Frontend Base URL: {}", config.settings.frontend_base_url);
    println!("  Monthly Fee: {}", config.settings.default_monthly_fee);
    println!("  Replacement Fee: {}", config.settings.replacement_fee);
    println!("  Payment Reminders: {}", config.settings.send_payment_reminders);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
