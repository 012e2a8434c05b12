//! Load harness: concurrent workers, outcome collection and reporting.
mod export;
mod limiter;
mod report;


use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::try_join_all;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::metrics::{RunSummary, SummaryCollector};
use crate::registration::{RegistrationOutcome, RegistrationParams, SampleExecutor};
use crate::shutdown::{ShutdownReceiver, ShutdownSender};

use limiter::SampleLimiter;

pub use export::{SampleRecord, SampleWriter};
pub(crate) use report::{outcome_lines, print_lines, summary_lines};

const OUTCOME_CHANNEL_CAPACITY: usize = 1024;
const PROGRESS_EVERY: u64 = 1000;

/// What one load run should do.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub params: RegistrationParams,
    pub timeout: Duration,
    pub requests: u64,
    pub concurrency: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Shutdown arrived before every requested sample was issued.
    pub interrupted: bool,
}

/// Runs `settings.requests` samples on `settings.concurrency` workers.
///
/// A shutdown signal stops new samples from starting; samples already in
/// flight finish within their own timeout.
///
/// # Errors
///
/// Returns an error when the output file cannot be written, the histogram
/// fails, or a worker task panics.
pub async fn run_load(
    settings: &LoadSettings,
    executor: &SampleExecutor,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunReport> {
    let writer = match settings.output.as_deref() {
        Some(path) => Some(SampleWriter::create(path).await?),
        None => None,
    };
    let collector = SummaryCollector::new()?;
    let (outcome_tx, outcome_rx) = mpsc::channel::<RegistrationOutcome>(OUTCOME_CHANNEL_CAPACITY);
    let collector_task = tokio::spawn(collect(outcome_rx, collector, writer));

    let limiter = Arc::new(SampleLimiter::new(settings.requests));
    let started = Instant::now();
    info!(
        requests = settings.requests,
        concurrency = settings.concurrency,
        "Starting registration load."
    );

    let workers: Vec<JoinHandle<()>> = (0..settings.concurrency)
        .map(|worker_id| {
            tokio::spawn(worker(
                worker_id,
                executor.clone(),
                settings.params.clone(),
                settings.timeout,
                Arc::clone(&limiter),
                outcome_tx.clone(),
                shutdown_tx.subscribe(),
            ))
        })
        .collect();
    drop(outcome_tx);

    try_join_all(workers).await?;
    let duration = started.elapsed();
    let collector = collector_task.await??;

    let interrupted = limiter.issued() < settings.requests;
    if interrupted {
        info!(
            issued = limiter.issued(),
            requested = settings.requests,
            "Run interrupted before all samples were issued."
        );
    }
    Ok(RunReport {
        summary: collector.finish(duration),
        interrupted,
    })
}

async fn worker(
    worker_id: usize,
    executor: SampleExecutor,
    params: RegistrationParams,
    timeout: Duration,
    limiter: Arc<SampleLimiter>,
    outcome_tx: mpsc::Sender<RegistrationOutcome>,
    mut shutdown_rx: ShutdownReceiver,
) {
    loop {
        match shutdown_rx.try_recv() {
            Err(broadcast::error::TryRecvError::Empty) => {}
            Ok(())
            | Err(
                broadcast::error::TryRecvError::Closed | broadcast::error::TryRecvError::Lagged(_),
            ) => {
                debug!(worker_id, "Worker stopping on shutdown.");
                break;
            }
        }
        if !limiter.try_reserve() {
            break;
        }
        let outcome = executor.run_params(&params, timeout).await;
        if outcome_tx.send(outcome).await.is_err() {
            break;
        }
    }
}

async fn collect(
    mut outcome_rx: mpsc::Receiver<RegistrationOutcome>,
    mut collector: SummaryCollector,
    mut writer: Option<SampleWriter>,
) -> AppResult<SummaryCollector> {
    while let Some(outcome) = outcome_rx.recv().await {
        collector.record(&outcome)?;
        if let Some(writer) = writer.as_mut() {
            writer
                .write(&SampleRecord::from_outcome(&outcome, Utc::now()))
                .await?;
        }
        let total = collector.total();
        if total.checked_rem(PROGRESS_EVERY) == Some(0) {
            info!(samples = total, "Progress.");
        }
    }
    if let Some(writer) = writer {
        writer.finish().await?;
    }
    Ok(collector)
}
