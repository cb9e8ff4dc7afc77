use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio_util::sync::CancellationToken;

use dnsweep::config::{Config, Opt};
use dnsweep::initialization::{init_logger, spawn_signal_listener};
use dnsweep::run_sweep_with_cancel;

/// Exit code used when the run was cut short by a shutdown signal.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger(&opt).context("Failed to initialize logger")?;

    let config = Config::from_opt(&opt).context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let report = run_sweep_with_cancel(config, cancel)
        .await
        .context("Error processing DNS queries")?;

    if report.cancelled {
        info!("Sweep interrupted; partial results above");
        std::process::exit(EXIT_CANCELLED);
    }

    Ok(())
}
