//! Shared runner for the download and copy commands
//!
//! Resolves settings (flag > environment > config file > default), builds the
//! S3 client, drives the engine and renders its outcomes.

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tracing::debug;

use bt_core::{
    Config, ConfigManager, DestinationRoot, EndpointConfig, Error, FailureRecord, ObjectStore,
    RemotePath, RetryConfig, RunReport, StatsSnapshot, Summary, TransferEngine, TransferObserver,
    TransferOptions, TransferOutcome, TransferPlan, TransferStatus,
};
use bt_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Options common to every transfer command
#[derive(Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Number of objects transferred at the same time
    #[arg(long, env = "BT_MAX_WORKERS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_workers: Option<u32>,

    /// Only show what would be transferred
    #[arg(long)]
    pub dry_run: bool,

    /// Custom endpoint URL for S3-compatible services
    #[arg(long, env = "BT_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Region override
    #[arg(long, env = "BT_REGION")]
    pub region: Option<String>,

    /// Named profile from the shared AWS config files
    #[arg(long, env = "BT_PROFILE")]
    pub profile: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub force_path_style: bool,
}

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    Download,
    Copy,
}

impl TransferMode {
    fn banner_verb(self) -> &'static str {
        match self {
            Self::Download => "Downloading",
            Self::Copy => "Copying",
        }
    }

    fn done_verb(self, dry_run: bool) -> &'static str {
        match (self, dry_run) {
            (Self::Download, false) => "Downloaded",
            (Self::Copy, false) => "Copied",
            (Self::Download, true) => "Would download",
            (Self::Copy, true) => "Would copy",
        }
    }

    fn error_verb(self) -> &'static str {
        match self {
            Self::Download => "downloading",
            Self::Copy => "copying",
        }
    }
}

/// Load configuration, connect and run one transfer
pub async fn run(
    mode: TransferMode,
    source: RemotePath,
    destination: DestinationRoot,
    args: &TransferArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    let endpoint = endpoint_config(args, &config);
    let options = transfer_options(args, &config);
    debug!(
        endpoint = endpoint.url.as_deref().unwrap_or("default"),
        region = endpoint.region.as_deref().unwrap_or("default"),
        max_workers = options.max_workers,
        "Resolved transfer settings"
    );

    let client = match S3Client::new(&endpoint).await {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::from(&e);
        }
    };

    let output_config = OutputConfig {
        no_progress: output_config.no_progress || !config.defaults.progress,
        ..output_config
    };
    let plan = TransferPlan {
        source,
        destination,
    };

    execute_plan(
        mode,
        Arc::new(client),
        plan,
        options,
        output_config,
    )
    .await
}

/// Run a plan against `store` and render the results
pub async fn execute_plan(
    mode: TransferMode,
    store: Arc<dyn ObjectStore>,
    plan: TransferPlan,
    options: TransferOptions,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());
    let dry_run = options.dry_run;

    if !formatter.is_json() {
        formatter.println(&banner(mode, &plan));
    }

    let observer = Arc::new(ConsoleObserver {
        mode,
        dry_run,
        formatter: formatter.clone(),
        progress: ProgressBar::new(&output_config),
    });

    let engine = TransferEngine::new(store, options);
    let token = engine.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = engine.run(plan, observer.clone()).await;
    interrupt.abort();
    observer.progress.finish_and_clear();

    match result {
        Ok(report) => {
            if formatter.is_json() {
                formatter.json_line(&ReportOutput::new(mode, dry_run, &report));
            } else {
                formatter.line(&report.summary.to_string());
            }

            if report.summary.is_complete_success() {
                ExitCode::Success
            } else {
                ExitCode::PartialFailure
            }
        }
        Err(Error::Interrupted) => {
            formatter.warning("Interrupted, incomplete files were removed");
            ExitCode::Interrupted
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

fn transfer_options(args: &TransferArgs, config: &Config) -> TransferOptions {
    TransferOptions {
        max_workers: args
            .max_workers
            .map(|n| n as usize)
            .unwrap_or(config.defaults.max_workers),
        queue_capacity: config.defaults.queue_capacity,
        list_retry: config.endpoint.retry_config(),
        item_retry: RetryConfig::per_item(),
        dry_run: args.dry_run,
    }
}

fn endpoint_config(args: &TransferArgs, config: &Config) -> EndpointConfig {
    let mut endpoint = config.endpoint.clone();
    if let Some(url) = &args.endpoint_url {
        endpoint.url = Some(url.clone());
    }
    if let Some(region) = &args.region {
        endpoint.region = Some(region.clone());
    }
    if let Some(profile) = &args.profile {
        endpoint.profile = Some(profile.clone());
    }
    endpoint.force_path_style |= args.force_path_style;
    endpoint
}

fn banner(mode: TransferMode, plan: &TransferPlan) -> String {
    let destination = match &plan.destination {
        DestinationRoot::Local(dir) => dir.display().to_string(),
        DestinationRoot::Remote(prefix) => prefix.to_string(),
    };
    format!("{} from {} to {destination}", mode.banner_verb(), plan.source)
}

/// Human-readable line for one outcome
fn render_outcome(mode: TransferMode, dry_run: bool, outcome: &TransferOutcome) -> String {
    match (&outcome.status, &outcome.destination) {
        (TransferStatus::Success { .. }, Some(destination)) => format!(
            "{}: {} to {destination}",
            mode.done_verb(dry_run),
            outcome.source.key
        ),
        (TransferStatus::Success { .. }, None) => {
            format!("{}: {}", mode.done_verb(dry_run), outcome.source.key)
        }
        (TransferStatus::Failure { reason }, _) => format!(
            "Error {} {}: {reason}",
            mode.error_verb(),
            outcome.source.key
        ),
    }
}

/// Prints each outcome as it arrives and keeps the progress bar current
struct ConsoleObserver {
    mode: TransferMode,
    dry_run: bool,
    formatter: Formatter,
    progress: ProgressBar,
}

impl TransferObserver for ConsoleObserver {
    fn on_outcome(&self, outcome: &TransferOutcome, stats: &StatsSnapshot) {
        self.progress.suspend(|| {
            if self.formatter.is_json() {
                self.formatter.json_line(outcome);
            } else if outcome.is_success() {
                self.formatter
                    .println(&render_outcome(self.mode, self.dry_run, outcome));
            } else {
                self.formatter
                    .line(&render_outcome(self.mode, self.dry_run, outcome));
            }
        });
        self.progress.update(stats.processed(), stats.discovered);
    }

    fn on_listing_complete(&self, total: u64) {
        self.progress.set_total(total);
    }
}

/// Final JSON line of a run
#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    mode: TransferMode,
    dry_run: bool,
    summary: Summary,
    success_rate: f64,
    bytes: u64,
    bytes_human: String,
    elapsed_ms: u64,
    failures: &'a [FailureRecord],
}

impl<'a> ReportOutput<'a> {
    fn new(mode: TransferMode, dry_run: bool, report: &'a RunReport) -> Self {
        Self {
            mode,
            dry_run,
            summary: report.summary,
            success_rate: (report.summary.success_rate() * 100.0).round() / 100.0,
            bytes: report.bytes,
            bytes_human: humansize::format_size(report.bytes, humansize::BINARY),
            elapsed_ms: report.elapsed.as_millis() as u64,
            failures: &report.failures,
        }
    }
}
