use anyhow::Result;
use aqua_config::AppConfig;
use aqua_server::{logging, AquaMonitor};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/aqua.toml")]
    config: PathBuf,

    /// Run a single classification tick and exit
    #[arg(long)]
    once: bool,

    /// Classify one pool, print the result as JSON and exit
    #[arg(long)]
    pool: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_or_default(&args.config)?;
    logging::init(&config.logging)?;
    info!("Starting aqua-monitor with config: {:?}", args.config);

    let monitor = Arc::new(AquaMonitor::from_config(&config).await?);

    if let Some(pool_id) = args.pool {
        let classification = monitor.latest_classification(pool_id).await?;
        println!("{}", serde_json::to_string_pretty(&classification)?);
        return Ok(());
    }

    let scheduler = Arc::new(monitor.scheduler(&config.scheduler));

    if args.once {
        let report = scheduler.run_tick().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let watcher = if config.limits.watch {
        match monitor.watch_limits().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Limits hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let scheduler_handle = if config.scheduler.enabled {
        Some(scheduler.clone().start())
    } else {
        info!("Classification scheduler disabled");
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Some(handle) = scheduler_handle {
        handle.shutdown().await;
    }
    if let Some(handle) = watcher {
        handle.abort();
    }

    info!("aqua-monitor stopped");
    Ok(())
}
