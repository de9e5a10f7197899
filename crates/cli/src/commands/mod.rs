//! CLI command definitions and execution
//!
//! Each subcommand lives in its own module and returns an [`ExitCode`].

use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

pub mod completions;
pub mod copy;
pub mod download;
pub mod transfer;

/// bt - bulk transfer for S3-compatible object storage
///
/// Downloads or copies every object under a bucket prefix with a fixed pool
/// of concurrent workers.
#[derive(Parser, Debug)]
#[command(name = "bt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit one JSON object per line instead of text
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Only print failures and the summary
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every object under a prefix to a local directory
    Download(download::DownloadArgs),

    /// Copy every object under a prefix to another bucket or prefix
    Copy(copy::CopyArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Download(args) => download::execute(args, output_config).await,
        Commands::Copy(args) => copy::execute(args, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}
