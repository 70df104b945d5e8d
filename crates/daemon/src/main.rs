//! calrecon - calendar reconciliation daemon
//!
//! Loads configuration, starts the cycle scheduler and runs until Ctrl-C.

use anyhow::Context;
use calrecon_daemon::AppContext;
use calrecon_infra::{config, observability};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load().context("failed to load configuration")?;
    observability::init_tracing(&config.logging).context("failed to initialize logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "calrecon starting");

    let mut ctx = AppContext::new(config).context("failed to build application context")?;
    ctx.scheduler.start().await.context("failed to start cycle scheduler")?;
    info!("scheduler running; press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }

    info!("shutting down");
    ctx.scheduler.stop().await.context("failed to stop cycle scheduler")?;
    info!("calrecon stopped");
    Ok(())
}
