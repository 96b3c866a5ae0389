use pairing_engine::config::Settings;
use pairing_engine::jobs::{run_all, JobContext};
use pairing_engine::services::PostgresStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(settings: &Settings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format =
        std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    // stdout carries the run summary only
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);
    info!("Starting pairing engine batch run...");

    let store = match PostgresStore::from_settings(&settings.database).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match store.health_check().await {
        Ok(true) => info!("PostgreSQL connection healthy"),
        Ok(false) => warn!("PostgreSQL health check returned no result"),
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!(
        "Matcher configured: mode {:?}, max age gap {}, exclusion scope {:?}",
        settings.matching.scoring_mode,
        settings.matching.max_age_gap,
        settings.rematch.exclusion_scope
    );

    let ctx = JobContext::from_settings(Arc::new(store), &settings);

    let summary = match run_all(&ctx, chrono::Utc::now()).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Batch run failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize run summary: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!("Batch run complete");
    ExitCode::SUCCESS
}
