//! slotdb binary entry point
//!
//! Parses arguments, initializes logging and hands off to
//! [`slotdb_cli::run`].

use anyhow::Result;
use clap::Parser;
use slotdb_cli::cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr so reports on stdout stay machine readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    slotdb_cli::run(cli, &mut std::io::stdout().lock())
}
