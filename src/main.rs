use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bili_archive_checker::cli::Cli;
use bili_archive_checker::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose turns on per-poll and per-request detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,bili_archive_checker=debug")
        } else {
            EnvFilter::new("info")
        }
    });

    // stdout belongs to the status sink
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli.run().await
}
