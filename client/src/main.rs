use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client::{
    config::{load_config, CONFIG_PATH},
    worker::{start_workers, Intervals},
};
use log::info;
use tokio::signal::ctrl_c;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exposes local TCP services through an edge server")]
struct Cli {
    /// Service list to keep tunnels up for
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    info!("booting with {} services...", cfg.services.len());
    info!("contacting edge server at {}...", cfg.server_address);

    let workers = start_workers(&cfg, Intervals::default());

    ctrl_c().await?;

    info!("shutting down...");

    for worker in workers {
        worker.abort();
    }

    Ok(())
}

fn init_logging() {
    let level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
