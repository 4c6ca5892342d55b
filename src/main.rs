use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listing_buddy::ai::AiService;
use listing_buddy::config::LoggingConfig;
use listing_buddy::jobs::{JobKind, JobRunner};
use listing_buddy::listing_manager::ListingManager;
use listing_buddy::pricing::PriceSuggestionService;
use listing_buddy::scheduler::ListingScheduler;
use listing_buddy::scraper::Marketplaces;
use listing_buddy::storage::ImageStore;
use listing_buddy::web::{create_router, AppState};
use listing_buddy::{AppConfig, Database};

/// Marketplace listing manager with AI descriptions and price tracking
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the job scheduler (default)
    Serve,
    /// Run one background job now and print its execution record
    RunJob {
        /// refresh_listings, competitor_prices or cleanup
        job_id: String,
    },
    /// Apply database migrations and exit
    Migrate,
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "listing-buddy.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

async fn build_state(config: AppConfig) -> Result<AppState> {
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to apply migrations")?;

    let marketplaces = Marketplaces::from_config(&config.scraper)?;
    let listings = ListingManager::new(db.clone(), marketplaces.clone());
    let ai = AiService::from_config(&config.ai, &config.scraper.user_agent)?;
    let pricing = PriceSuggestionService::new(marketplaces.clone(), config.scraper.max_results);
    let images = ImageStore::new(&config.storage).context("Failed to prepare upload directory")?;

    let runner = JobRunner::new(
        listings.clone(),
        marketplaces,
        config.scheduler.clone(),
        config.scraper.max_results,
    );
    let scheduler = ListingScheduler::new(runner, config.scheduler.clone()).await?;

    let metrics = if config.metrics.enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    Ok(AppState {
        db,
        listings,
        ai: Arc::new(ai),
        pricing,
        images,
        scheduler: Arc::new(scheduler),
        config: Arc::new(config),
        metrics,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

async fn serve(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config).await?;
    state.scheduler.start().await?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    let scheduler = state.scheduler.clone();
    let db = state.db.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            if let Err(e) = scheduler.shutdown().await {
                error!("Failed to stop scheduler: {}", e);
            }
        })
        .await?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}

async fn run_job(config: AppConfig, job_id: &str) -> Result<()> {
    let kind: JobKind = job_id.parse()?;
    let state = build_state(config).await?;

    let execution = state.scheduler.runner().run(kind).await?;
    println!("{}", serde_json::to_string_pretty(&execution)?);
    state.db.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _guard = init_tracing(&config.logging)?;
    info!("Starting listing-buddy {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::RunJob { job_id } => run_job(config, &job_id).await,
        Command::Migrate => {
            let db = Database::connect(&config.database).await?;
            db.migrate().await?;
            info!("Migrations applied");
            db.close().await;
            Ok(())
        }
    }
}
