mod cmd;
mod output;
mod wiring;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;
use watermill_core::config::Config;

#[derive(Parser)]
#[command(
    name = "watermill",
    about = "Bundle classification worker and live coin feed",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./watermill.yaml when present)
    #[arg(long, global = true, env = "WATERMILL_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bundle worker and serve the live feed
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
        /// Serve the feed and collaborator endpoints without polling the queue
        #[arg(long)]
        no_worker: bool,
    },

    /// Poll the queue once and process at most one bundle
    RunOnce,

    /// Push a bundle onto the queue
    Enqueue {
        #[arg(long)]
        bundle_id: String,
        #[arg(long)]
        image_url: String,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::RunOnce => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = Config::load(cli.config.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|config| match cli.command {
            Commands::Serve { port, no_worker } => cmd::serve::run(config, port, no_worker),
            Commands::RunOnce => cmd::run_once::run(config, cli.json),
            Commands::Enqueue {
                bundle_id,
                image_url,
            } => cmd::enqueue::run(config, &bundle_id, &image_url, cli.json),
            Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
        });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
