//! Concurrent transfer engine
//!
//! One dispatch loop streams the source listing, maps each key to its
//! destination and pushes tasks into a bounded queue. A fixed pool of workers
//! drains the queue, one transfer per worker at a time, and reports every
//! outcome to the aggregator. A failing object only ever produces a failure
//! outcome; only listing errors and cancellation end a run early.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, pin_mut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregator, FailureRecord, Summary, TransferObserver, TransferStats};
use crate::endpoint::RetryConfig;
use crate::error::{Error, Result};
use crate::lister::list_prefix;
use crate::mapper::{DestinationRef, DestinationRoot, map_destination};
use crate::materialize::{ensure_dir, ensure_parent_dir};
use crate::path::RemotePath;
use crate::retry::with_retry;
use crate::task::{TransferOutcome, TransferTask};
use crate::traits::{ObjectDescriptor, ObjectStore};

/// Size of the buffer used to stream object bodies to disk
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Tuning for one run
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Number of workers, and so the maximum number of transfers in flight
    pub max_workers: usize,

    /// Work queue capacity; 0 means twice the worker count
    pub queue_capacity: usize,

    /// Retry policy for listing pages
    pub list_retry: RetryConfig,

    /// Retry policy for each object transfer
    pub item_retry: RetryConfig,

    /// Map and report every object without transferring anything
    pub dry_run: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            max_workers: crate::config::DEFAULT_MAX_WORKERS,
            queue_capacity: 0,
            list_retry: RetryConfig::default(),
            item_retry: RetryConfig::per_item(),
            dry_run: false,
        }
    }
}

impl TransferOptions {
    /// Options with `max_workers` workers, which must be at least 1
    pub fn with_workers(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(Error::Config("max workers must be at least 1".into()));
        }
        Ok(Self {
            max_workers,
            ..Self::default()
        })
    }

    fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            self.max_workers * 2
        } else {
            self.queue_capacity
        }
    }
}

/// What to transfer and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Source bucket and prefix
    pub source: RemotePath,
    /// Local directory or destination bucket prefix
    pub destination: DestinationRoot,
}

/// Everything known about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: Summary,
    /// Bytes written to local files
    pub bytes: u64,
    pub elapsed: Duration,
    /// Up to [`crate::aggregate::MAX_FAILURE_LOG`] failures, oldest first
    pub failures: Vec<FailureRecord>,
}

/// Bulk transfer engine over an [`ObjectStore`]
pub struct TransferEngine {
    store: Arc<dyn ObjectStore>,
    options: TransferOptions,
    cancel: CancellationToken,
}

impl TransferEngine {
    /// Create an engine; `options.max_workers` is clamped to at least 1
    pub fn new(store: Arc<dyn ObjectStore>, mut options: TransferOptions) -> Self {
        options.max_workers = options.max_workers.max(1);
        Self {
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one transfer to completion.
    ///
    /// Returns the report once every listed object has reported an outcome.
    /// Fails without a report when the listing fails, when the prefix is
    /// empty, or when the run is cancelled.
    pub async fn run(&self, plan: TransferPlan, observer: Arc<dyn TransferObserver>) -> Result<RunReport> {
        let started = Instant::now();
        let workers = self.options.max_workers;
        let capacity = self.options.effective_queue_capacity();

        info!(
            source = %plan.source,
            workers,
            queue_capacity = capacity,
            dry_run = self.options.dry_run,
            "Starting transfer"
        );

        if let DestinationRoot::Remote(dest) = &plan.destination
            && dest.overlaps(&plan.source)
        {
            return Err(Error::InvalidPath(format!(
                "copy destination {dest} overlaps source {}",
                plan.source
            )));
        }

        if let DestinationRoot::Local(root) = &plan.destination
            && !self.options.dry_run
        {
            ensure_dir(root).await?;
        }

        // Fatal listing errors stop the workers without touching the caller's token.
        let run_token = self.cancel.child_token();
        let stats = Arc::new(TransferStats::new());

        let (task_tx, task_rx) = async_channel::bounded::<TransferTask>(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel::<TransferOutcome>(capacity);

        let aggregator = tokio::spawn(Aggregator::new(stats.clone(), observer.clone()).run(outcome_rx));

        let context = Arc::new(WorkerContext {
            store: self.store.clone(),
            source_bucket: plan.source.bucket.clone(),
            retry: self.options.item_retry.clone(),
            dry_run: self.options.dry_run,
        });
        let worker_handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    context.clone(),
                    task_rx.clone(),
                    outcome_tx.clone(),
                    run_token.clone(),
                ))
            })
            .collect();
        drop(task_rx);

        let dispatched = self
            .dispatch(&plan, &stats, task_tx, &outcome_tx, &run_token)
            .await;
        stats.mark_listing_complete();

        if dispatched.is_err() {
            run_token.cancel();
        }

        for (worker_id, result) in futures::future::join_all(worker_handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = result {
                error!(worker = worker_id, error = %e, "Worker task panicked");
            }
        }
        drop(outcome_tx);

        let received = aggregator
            .await
            .map_err(|e| Error::General(format!("Aggregator task failed: {e}")))?;

        let total = dispatched?;
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        observer.on_listing_complete(total);

        let mut summary = stats.summary();
        if received < total {
            // Only a panicked worker can lose a task; count what it held as failed.
            error!(total, received, "Some transfers never reported an outcome");
            summary.failed = total - summary.succeeded;
        }

        let report = RunReport {
            summary,
            bytes: stats.snapshot().bytes,
            elapsed: started.elapsed(),
            failures: stats.failures(),
        };

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            bytes = %humansize::format_size(report.bytes, humansize::BINARY),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Transfer finished"
        );

        Ok(report)
    }

    /// Stream the listing into the work queue; returns the number of objects.
    ///
    /// Keys that cannot be mapped are reported as failures right here and
    /// never reach a worker. The queue closes when this returns.
    async fn dispatch(
        &self,
        plan: &TransferPlan,
        stats: &TransferStats,
        tasks: async_channel::Sender<TransferTask>,
        outcomes: &mpsc::Sender<TransferOutcome>,
        token: &CancellationToken,
    ) -> Result<u64> {
        let listing = list_prefix(
            self.store.clone(),
            plan.source.clone(),
            self.options.list_retry.clone(),
        );
        pin_mut!(listing);

        let mut total = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Interrupted),
                next = listing.next() => next,
            };

            let object = match next {
                None => break,
                Some(Err(e)) => {
                    error!(source = %plan.source, error = %e, "Listing failed");
                    return Err(e);
                }
                Some(Ok(object)) => object,
            };
            total = stats.record_discovered();

            let destination = match map_destination(&plan.source.key, &object.key, &plan.destination) {
                Ok(destination) => destination,
                Err(e) => {
                    warn!(key = %object.key, error = %e, "Rejected object key");
                    if outcomes
                        .send(TransferOutcome::rejected(object, e.to_string()))
                        .await
                        .is_err()
                    {
                        return Err(Error::General("Outcome channel closed".into()));
                    }
                    continue;
                }
            };

            let task = TransferTask {
                source: object,
                destination,
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::Interrupted),
                sent = tasks.send(task) => {
                    if sent.is_err() {
                        return Err(Error::General("All transfer workers stopped".into()));
                    }
                }
            }
        }

        debug!(total, "Listing complete, closing work queue");
        Ok(total)
    }
}

/// Shared, read-only state for the worker pool
struct WorkerContext {
    store: Arc<dyn ObjectStore>,
    source_bucket: String,
    retry: RetryConfig,
    dry_run: bool,
}

async fn worker_loop(
    worker_id: usize,
    context: Arc<WorkerContext>,
    tasks: async_channel::Receiver<TransferTask>,
    outcomes: mpsc::Sender<TransferOutcome>,
    token: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            task = tasks.recv() => match task {
                Ok(task) => task,
                Err(_) => break,
            },
        };

        // Abandoning the transfer drops its temporary file.
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = execute(&context, task) => outcome,
        };

        if outcomes.send(outcome).await.is_err() {
            break;
        }
    }
    debug!(worker = worker_id, "Worker stopped");
}

/// Perform one task, turning any error into a failure outcome
async fn execute(context: &WorkerContext, task: TransferTask) -> TransferOutcome {
    debug!(key = %task.source.key, destination = %task.destination, "Transferring");

    if context.dry_run {
        return TransferOutcome::success(task, 0);
    }

    let source = RemotePath::new(context.source_bucket.clone(), task.source.key.clone());
    let result = match &task.destination {
        DestinationRef::LocalFile { path } => {
            with_retry(&context.retry, "download", || {
                download(context.store.as_ref(), &source, &task.source, path)
            })
            .await
        }
        DestinationRef::RemoteObject { bucket, key } => {
            let target = RemotePath::new(bucket.clone(), key.clone());
            with_retry(&context.retry, "copy", || {
                context.store.copy_object(&source, &target)
            })
            .await
            .map(|()| 0)
        }
    };

    match result {
        Ok(bytes) => TransferOutcome::success(task, bytes),
        Err(e) => {
            warn!(key = %task.source.key, error = %e, "Transfer failed");
            TransferOutcome::failure(task, e.to_string())
        }
    }
}

/// Stream one object into `path` through a temporary sibling file.
///
/// Directory markers become directories. The destination only ever holds a
/// complete body: the temporary file is renamed over it on success and
/// removed on any failure.
async fn download(store: &dyn ObjectStore, source: &RemotePath, object: &ObjectDescriptor, path: &Path) -> Result<u64> {
    if object.is_dir_marker() {
        ensure_dir(path).await?;
        return Ok(0);
    }

    ensure_parent_dir(path).await?;
    let mut reader = store.get_object(source).await?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let temp = tempfile::Builder::new()
        .prefix(".bt-")
        .suffix(".part")
        .tempfile_in(&parent)
        .map_err(|e| Error::local_io(path, e))?;
    let mut file = tokio::fs::File::from_std(temp.reopen().map_err(|e| Error::local_io(path, e))?);

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| Error::Network(format!("Reading {source}: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .await
            .map_err(|e| Error::local_io(path, e))?;
        written += n as u64;
    }
    file.flush().await.map_err(|e| Error::local_io(path, e))?;
    drop(file);

    temp.persist(path).map_err(|e| Error::local_io(path, e.error))?;
    Ok(written)
}
