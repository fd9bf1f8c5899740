//! vocab-speaker: pronunciation service for the vocabulary trainer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vocab_speaker::speaker::api::{self, ApiState};
use vocab_speaker::{Config, Speaker};

#[derive(Parser, Debug)]
#[command(name = "vocab-speaker", about = "Italian/Bengali pronunciation service")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vocab-speaker starting");

    let config = Config::load(args.config.as_deref());
    info!(
        "Voices: Italian={} Bengali={} (dual_voice={})",
        config.synthesis.italian_voice, config.synthesis.bangla_voice, config.synthesis.dual_voice
    );

    let speaker = Arc::new(Speaker::from_config(&config)?);

    if config.api.enabled {
        let port = args.port.unwrap_or(config.api.port);
        api::start_api(ApiState { speaker: speaker.clone() }, port).await?;
    } else {
        warn!("API disabled in config; nothing to serve");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    speaker.stop();

    Ok(())
}
