//! bt - bulk transfer for S3-compatible object storage
//!
//! Downloads or copies every object under a bucket prefix concurrently and
//! reports a per-object result plus a final summary.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bulk_transfer::commands::{self, Cli};

/// Filter applied by `--debug`
const DEBUG_FILTER: &str = "bt_core=debug,bt_s3=debug,bulk_transfer=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries transfer results only.
    let filter = if cli.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
