use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use meowbah_sync::{Config, Database, FeedUpdater};

#[derive(Parser)]
#[command(name = "meowbah-sync")]
#[command(about = "Background feed sync for the Meowbah fan app", long_about = None)]
struct Cli {
    /// Run every feed once and exit.
    #[arg(long)]
    once: bool,

    /// Path to the configuration file.
    #[arg(default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = meowbah_sync::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        meowbah_sync::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    if config.feeds.is_empty() {
        warn!("No feeds configured, nothing to do");
        return ExitCode::SUCCESS;
    }

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut updater = match FeedUpdater::from_config(&config, &db) {
        Ok(updater) => updater,
        Err(e) => {
            error!("Failed to set up feeds: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("meowbah-sync {} starting", env!("CARGO_PKG_VERSION"));

    if cli.once {
        let outcomes = updater.run_once().await;
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            "Sync finished: {} feed(s), {} failed",
            outcomes.len(),
            failed
        );
        return if failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    tokio::select! {
        _ = updater.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    ExitCode::SUCCESS
}
