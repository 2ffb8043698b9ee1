//! LevelCam CLI: simulate, crop, and capture horizon-locked footage.
//!
//! Usage:
//!   levelcam simulate [OPTIONS]        Run the estimator over motion samples
//!   levelcam crop <INPUT> -o <OUTPUT>  Cut the level crop out of an image
//!   levelcam capture [OPTIONS]         Record a synthetic session to PNGs
//!   levelcam check                     Validate and print the configuration
//!   levelcam init-config               Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use levelcam_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "levelcam",
    about = "Horizon-locked camera stabilization",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/levelcam/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the motion estimator and crop geometry, printing JSON lines
    Simulate(commands::simulate::SimulateArgs),

    /// Apply the persistence crop to an image file
    Crop(commands::crop::CropArgs),

    /// Run a live session on synthetic motion and frames, writing PNGs
    Capture(commands::capture::CaptureArgs),

    /// Validate the configuration and print effective settings
    Check,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    levelcam_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(&config, args),
        Commands::Crop(args) => commands::crop::run(&config, args),
        Commands::Capture(args) => commands::capture::run(&config, args).await,
        Commands::Check => commands::check::run(&config, cli.config),
        Commands::InitConfig { force } => commands::init_config::run(cli.config, force),
    }
}
