mod application;
mod presentation;

use bagit_core::error::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::presentation::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level: tracing::Level = cli.log_level.parse().unwrap_or(tracing::Level::WARN);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    application::run(cli)
}
