//! download command - Fetch every object under a prefix to a local directory

use std::path::{Path, PathBuf};

use clap::Args;
use bt_core::{DestinationRoot, RemotePath};

use super::transfer::{self, TransferArgs, TransferMode};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Download a prefix
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Source location (s3://bucket/prefix/)
    pub source: String,

    /// Local directory to download into; created if missing
    pub destination: PathBuf,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Execute the download command
pub async fn execute(args: DownloadArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let source = match RemotePath::parse_prefix(&args.source) {
        Ok(path) => path,
        Err(e) => {
            formatter.error(&format!("Invalid source path: {e}"));
            return ExitCode::UsageError;
        }
    };

    if let Err(message) = check_destination(&args.destination) {
        formatter.error(&message);
        return ExitCode::UsageError;
    }

    transfer::run(
        TransferMode::Download,
        source,
        DestinationRoot::Local(args.destination),
        &args.transfer,
        output_config,
    )
    .await
}

/// The destination may be missing, but never a non-directory
fn check_destination(destination: &Path) -> Result<(), String> {
    match std::fs::metadata(destination) {
        Ok(meta) if !meta.is_dir() => Err(format!(
            "Destination '{}' exists and is not a directory",
            destination.display()
        )),
        _ => Ok(()),
    }
}
