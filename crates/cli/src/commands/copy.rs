//! copy command - Server-side copy of every object under a prefix

use clap::Args;
use bt_core::{DestinationRoot, RemotePath};

use super::transfer::{self, TransferArgs, TransferMode};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy a prefix to another bucket or prefix
#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source location (s3://bucket/prefix/)
    pub source: String,

    /// Destination location (s3://bucket/prefix/)
    pub destination: String,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Execute the copy command
pub async fn execute(args: CopyArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let source = match RemotePath::parse_prefix(&args.source) {
        Ok(path) => path,
        Err(e) => {
            formatter.error(&format!("Invalid source path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let destination = match RemotePath::parse_prefix(&args.destination) {
        Ok(path) => path,
        Err(e) => {
            formatter.error(&format!("Invalid destination path: {e}"));
            return ExitCode::UsageError;
        }
    };

    if source.overlaps(&destination) {
        formatter.error(&format!(
            "Source {source} and destination {destination} overlap; copy into a separate prefix"
        ));
        return ExitCode::UsageError;
    }

    transfer::run(
        TransferMode::Copy,
        source,
        DestinationRoot::Remote(destination),
        &args.transfer,
        output_config,
    )
    .await
}
