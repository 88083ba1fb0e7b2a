use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use cassbot::application::errors::BotError;
use cassbot::application::services::{BotService, Supervisor};
use cassbot::infrastructure::adapters::ConsoleConnector;
use cassbot::infrastructure::config::Config;
use cassbot::infrastructure::storage::JsonSnapshotStore;
use cassbot::plugins::builtin::{self, admin::ADMIN_PRIV};
use cassbot::plugins::PluginRegistry;

#[derive(Parser)]
#[command(name = "cassbot")]
#[command(about = "A plugin-driven chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Snapshot file (overrides config)
    #[arg(short, long)]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(run_bot(&cli.config, cli.state_file)) {
                tracing::error!("cassbot stopped with an error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("cassbot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => match Config::default().to_yaml() {
            Ok(yaml) => {
                println!("{}", yaml);
                println!("\nSave this to config.yaml and adjust as needed.");
            }
            Err(e) => tracing::error!("Failed to render config: {}", e),
        },
    }
}

fn load_config(path: &Path) -> Result<Config, BotError> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env()?;
    Ok(config)
}

async fn run_bot(config_path: &Path, state_file: Option<PathBuf>) -> Result<(), BotError> {
    let mut config = load_config(config_path)?;
    if let Some(state_file) = state_file {
        config.state_file = state_file;
    }
    tracing::info!("Starting cassbot as {} on {}", config.bot.nickname, config.server);

    let catalog = Arc::new(builtin::builtin_catalog()?);
    let registry = Arc::new(PluginRegistry::new(catalog));
    let store = Arc::new(JsonSnapshotStore::new(&config.state_file));
    let service = Arc::new(BotService::new(config.identity(), registry.clone(), store));

    service.load().await;

    for name in &config.plugins.autoload {
        if let Err(e) = registry.enable_by_name(name) {
            tracing::error!("Problem enabling {}: {}", name, e);
        }
    }
    if let Some(admin) = &config.admin {
        service.grant(admin, ADMIN_PRIV);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.plugins.scan_period_secs > 0 {
        let registry = registry.clone();
        let mut stop = shutdown_rx.clone();
        let period = Duration::from_secs(config.plugins.scan_period_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => registry.rescan(),
                    _ = stop.changed() => break,
                }
            }
        });
    }

    // Only the console transport ships with the core
    if config.server != "console" {
        tracing::warn!("No transport for server {}, using the console", config.server);
    }
    let connector = ConsoleConnector::new(service.identity().nickname);
    let mut supervisor = Supervisor::new(service.clone(), config.reconnect.backoff());

    tokio::select! {
        result = supervisor.run(&connector, shutdown_rx) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }
    let _ = shutdown_tx.send(true);

    service.shutdown().await
}
