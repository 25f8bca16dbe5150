//! micromongo - minimal MongoDB wire protocol server
//!
//! Accepts TCP connections, decodes and logs OP_QUERY messages and echoes
//! every received buffer back to its sender. SIGINT, SIGTERM and SIGHUP stop
//! the server after all open connections have been cancelled.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use micromongo_common::config::sanitize_port;
use micromongo_protocol::{MongoServer, ShutdownCoordinator};

mod cli;
mod config;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::resolve(&cli).await?;

    // RUST_LOG wins over the configured level
    let directive = config.logging.filter_directive()?;
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    config.server.port = sanitize_port(config.server.port);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting micromongo server...");
    let server = MongoServer::bind(&config.server).await?;

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signals.listen_for_signals().await {
            error!(error = %e, "Failed to install signal handlers");
        }
    });

    let report = server.run(shutdown).await?;
    info!(
        cancelled = report.cancelled,
        completed = report.completed,
        failed = report.failed,
        "Successfully shutdown micromongo server."
    );

    Ok(())
}
