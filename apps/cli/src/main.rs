//! machine-config-server: serves first-boot Ignition documents to new nodes.
//!
//! Renders a pool's MachineConfig into a provisioning document and serves it
//! over HTTP, with a separate Prometheus metrics listener.

mod commands;
mod http;
mod metrics;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
