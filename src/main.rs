mod cli;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{BillingCommands, Cli, Commands, DbCommands};
use pettag_core::adapters::{InMemoryStore, LocalBlobStore, PostgresStore};
use pettag_core::auth::StaticTokenAuthorizer;
use pettag_core::config::Config;
use pettag_core::ports::BlobStore;
use pettag_core::services::{Notifier, TracingNotifier};
use pettag_core::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Billing(command) => {
            let state = build_state(&config).await?;
            match command {
                BillingCommands::Export => cli::handle_billing_export(&state).await,
                BillingCommands::Import { file } => cli::handle_billing_import(&state, &file).await,
                BillingCommands::AdjustFees { percentage } => {
                    cli::handle_billing_adjust_fees(&state, &percentage).await
                }
            }
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.storage_root));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let authorizer = Arc::new(StaticTokenAuthorizer::new(config.admin_token.clone()));

    let state = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = pettag_core::db::create_pool(database_url).await?;
            pettag_core::db::run_migrations(&pool).await?;
            AppState::build(
                Arc::new(PostgresStore::new(pool)),
                blobs,
                notifier,
                authorizer,
                config.settings.clone(),
                &config.session_secret,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory and lost on exit");
            AppState::build(
                Arc::new(InMemoryStore::new()),
                blobs,
                notifier,
                authorizer,
                config.settings.clone(),
                &config.session_secret,
            )
        }
    };
    Ok(state)
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    let app = pettag_core::create_app_with_cors(state, config.cors_allowed_origins.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
