//! Mapedit CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mapedit")]
#[command(about = "Inspect and manage map edit history backups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Session configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a history document and summarize it
    Inspect {
        /// History document (defaults to the backup under --root)
        file: Option<PathBuf>,
    },
    /// Check that a history document loads
    Validate {
        /// History document (defaults to the backup under --root)
        file: Option<PathBuf>,
    },
    /// Remove the history backup
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "mapedit={0},mapedit_core={0},mapedit_history={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Inspect { file } => {
            let path = commands::document_path(&cli.root, &config, file);
            commands::inspect(&path, config).await
        }
        Commands::Validate { file } => {
            let path = commands::document_path(&cli.root, &config, file);
            commands::validate(&path, config).await
        }
        Commands::Clear => {
            commands::clear(&cli.root, &config)
        }
        Commands::Version => {
            println!("Mapedit v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
