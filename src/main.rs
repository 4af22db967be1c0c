use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{ConfigCommand, ProjectCommand, StateCommand, SyncCommand};
use config::Config;
use trvis_core::{FileStore, ProjectRepository, RepositoryRegistry};

#[derive(Parser)]
#[command(name = "trvis")]
#[command(version)]
#[command(about = "Manage stored projects, locally or on a project service", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project(ProjectCommand),

    /// Export or import the whole project collection
    State(StateCommand),

    /// Replay pending changes and inspect sync state
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trvis=warn,trvis_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Project(cmd)) => {
            let (registry, repo) = open_repository(&config).await?;
            let result = cmd.run(repo.as_ref()).await;
            registry.clear_repositories().await;
            result?;
        }
        Some(Commands::State(cmd)) => {
            let (registry, repo) = open_repository(&config).await?;
            let result = cmd.run(repo.as_ref()).await;
            registry.clear_repositories().await;
            result?;
        }
        Some(Commands::Sync(cmd)) => {
            let (registry, repo) = open_repository(&config).await?;
            let result = cmd.run(repo.as_ref(), &config).await;
            registry.clear_repositories().await;
            result?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli_config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Builds the configured repository and initializes it.
async fn open_repository(
    config: &Config,
) -> Result<(RepositoryRegistry, Arc<dyn ProjectRepository>), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::new(config.data_dir.value.clone()));
    let registry = RepositoryRegistry::new(store)
        .with_error_callback(Arc::new(|message: &str| eprintln!("Sync failed: {}", message)));

    let repo = registry.create_repository(&config.repository)?;
    repo.initialize().await?;
    Ok((registry, repo))
}
