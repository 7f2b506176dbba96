//! Core fragmented downloader engine.
//!
//! Probes the URL, plans fragments, runs a fixed pool of worker threads fed
//! through bounded channels, waits for every fragment on a completion barrier,
//! then merges the fragment files into the output.

pub mod merge;
mod progress;
mod queue;
mod worker;

pub use merge::{merge_fragments, FragmentPart, MergeReport};
pub use progress::ProgressStats;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::DownloadError;
use crate::fetch_head::{self, ProbeResult};
use crate::output_name::output_name_from_url;
use crate::request::RequestTemplate;
use crate::retry::RetryPolicy;
use crate::segmenter::FragmentPlan;
use crate::transport::{CurlTransport, Transport};

use queue::{FragmentQueues, Requeue};
use worker::{Completion, WorkerShared};

/// Per-request timeout when unset or below [`MIN_TIMEOUT`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Smallest per-request timeout honoured as given.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Applies the timeout floor: anything below [`MIN_TIMEOUT`] becomes [`DEFAULT_TIMEOUT`].
pub fn effective_timeout(timeout: Duration) -> Duration {
    if timeout < MIN_TIMEOUT {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

/// Outcome of a finished download.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub output: PathBuf,
    pub total_bytes: u64,
    pub fragment_count: usize,
    /// Fragment indices in the order their workers finished them.
    pub completion_order: Vec<usize>,
    /// Fragments missing at merge time (zero-filled in the output).
    pub missing_fragments: Vec<usize>,
    pub throttle_events: u32,
    pub error_events: u32,
    /// True when the server ignored `Range` and the file was refetched whole.
    pub range_fallback: bool,
    pub elapsed: Duration,
}

impl DownloadReport {
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / secs
    }
}

/// What happened while fragments were in flight.
#[derive(Debug, Default)]
struct FetchSummary {
    completion_order: Vec<usize>,
    throttle_events: u32,
    error_events: u32,
}

/// One download: URL, concurrency, chunk size, output, timeout.
///
/// Configure with the builder methods, then call [`Download::run`]. Zero for
/// concurrency or chunk size means "use the default".
#[derive(Debug, Clone)]
pub struct Download {
    url: String,
    concurrency: usize,
    chunk_size: u64,
    output: Option<PathBuf>,
    timeout: Duration,
    headers: Vec<(String, String)>,
    retry_policy: RetryPolicy,
    overwrite: bool,
    progress: Option<tokio::sync::mpsc::Sender<ProgressStats>>,
}

impl Download {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            concurrency: 0,
            chunk_size: 0,
            output: None,
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
            retry_policy: RetryPolicy::default(),
            overwrite: false,
            progress: None,
        }
    }

    /// Worker count (default 24).
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    /// Fragment size in bytes (default: total size / concurrency, rounded up).
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Output path (default: last URL path segment in the current directory).
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Per-request timeout, subject to [`effective_timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = effective_timeout(timeout);
        self
    }

    /// Extra header sent with the probe and every fragment request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace an existing output file instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Receive a [`ProgressStats`] snapshot after each completed fragment.
    pub fn progress(mut self, tx: tokio::sync::mpsc::Sender<ProgressStats>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn effective_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(output_name_from_url(&self.url)))
    }

    /// Run the download over libcurl.
    pub fn run(&self) -> Result<DownloadReport> {
        self.run_with(&CurlTransport::default())
    }

    /// Run the download over `transport`. Blocks until the output is merged or a
    /// fragment fails fatally. With the default policy a fragment that never
    /// succeeds keeps this blocked.
    pub fn run_with<T: Transport>(&self, transport: &T) -> Result<DownloadReport> {
        let started = Instant::now();
        let output = self.output_path();
        if output.exists() && !self.overwrite {
            return Err(DownloadError::OutputExists(output).into());
        }

        let template = self.template()?;
        let head = fetch_head::probe(transport, &template, self.timeout)?;
        let plan = plan_for(&head, self.concurrency, self.chunk_size);
        if !plan.is_ranged() {
            tracing::warn!(
                size = ?head.content_length,
                "server did not advertise byte ranges or size; fetching as a single fragment"
            );
        }
        tracing::info!(
            url = %self.url,
            output = %output.display(),
            fragments = plan.fragment_count(),
            chunk_size = plan.chunk_size(),
            concurrency = plan.concurrency(),
            "starting download"
        );

        let mut range_fallback = false;
        let (plan, summary) = match self.fetch_all(transport, &template, &plan, &output, started) {
            Ok(summary) => (plan, summary),
            Err(e) => {
                merge::remove_fragments(&plan, &output);
                if !plan.is_ranged() || !ranges_ignored(&e) {
                    return Err(e);
                }
                tracing::warn!("server ignored byte ranges; fetching as a single fragment");
                range_fallback = true;
                let whole = FragmentPlan::whole(plan.total_size(), plan.concurrency());
                match self.fetch_all(transport, &template, &whole, &output, started) {
                    Ok(summary) => (whole, summary),
                    Err(e) => {
                        merge::remove_fragments(&whole, &output);
                        return Err(e);
                    }
                }
            }
        };

        tracing::info!("start to combine {} fragment(s)", plan.fragment_count());
        let parts = merge::parts_for(&plan, &output);
        let merged = merge_fragments(&parts, &output, plan.total_size())?;
        if !merged.missing.is_empty() {
            tracing::error!(missing = ?merged.missing, "output has holes: fragment files were missing");
        }

        let report = DownloadReport {
            total_bytes: plan.total_size().unwrap_or(merged.bytes_written),
            output,
            fragment_count: plan.fragment_count(),
            completion_order: summary.completion_order,
            missing_fragments: merged.missing,
            throttle_events: summary.throttle_events,
            error_events: summary.error_events,
            range_fallback,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            output = %report.output.display(),
            cost_secs = report.elapsed.as_secs_f64(),
            kib_per_sec = report.bytes_per_sec() / 1024.0,
            retries = report.error_events + report.throttle_events,
            "download written"
        );
        Ok(report)
    }

    fn template(&self) -> Result<RequestTemplate> {
        let template = RequestTemplate::get(&self.url)?;
        Ok(self
            .headers
            .iter()
            .fold(template, |t, (k, v)| t.with_header(k, v)))
    }

    /// Feeder + workers + completion barrier. Returns once every fragment file is
    /// written, or with the first fatal failure after stopping all threads.
    fn fetch_all<T: Transport>(
        &self,
        transport: &T,
        template: &RequestTemplate,
        plan: &FragmentPlan,
        output: &Path,
        started: Instant,
    ) -> Result<FetchSummary> {
        let count = plan.fragment_count();
        if count == 0 {
            return Ok(FetchSummary::default());
        }
        let concurrency = plan.concurrency();
        let shared = WorkerShared::new(
            transport,
            template,
            plan,
            output,
            self.timeout,
            self.retry_policy,
        );
        let FragmentQueues {
            work_tx,
            work,
            retry_tx,
            retry_rx,
        } = FragmentQueues::new(concurrency);
        let (done_tx, done_rx) = mpsc::sync_channel::<Completion>(concurrency);

        let outcome = thread::scope(|s| {
            let feeder = s.spawn(move || queue::feed(work_tx, retry_rx, count));
            let mut workers = Vec::with_capacity(concurrency);
            for id in 0..concurrency {
                let retry_tx = retry_tx.clone();
                let done_tx = done_tx.clone();
                let shared = &shared;
                let work = &work;
                workers.push(s.spawn(move || {
                    worker::run_worker(id, shared, work, retry_tx, done_tx)
                }));
            }
            drop(done_tx);

            let outcome = self.await_fragments(done_rx, &shared, started);
            if outcome.is_err() {
                shared.cancel.store(true, Ordering::Relaxed);
            }
            // Feeder exits on Shutdown and closes the work queue; idle workers follow.
            let _ = retry_tx.send(Requeue::Shutdown);
            drop(retry_tx);

            let mut panicked = feeder.join().is_err();
            for handle in workers {
                panicked |= handle.join().is_err();
            }
            match outcome {
                Ok(_) if panicked => Err(DownloadError::WorkerPanicked.into()),
                other => other,
            }
        });

        let completion_order = outcome?;
        Ok(FetchSummary {
            completion_order,
            throttle_events: shared.throttle_events.load(Ordering::Relaxed),
            error_events: shared.error_events.load(Ordering::Relaxed),
        })
    }

    /// Completion barrier: one receive per fragment.
    fn await_fragments<T: Transport>(
        &self,
        done_rx: Receiver<Completion>,
        shared: &WorkerShared<'_, T>,
        started: Instant,
    ) -> Result<Vec<usize>> {
        let count = shared.plan.fragment_count();
        let mut order = Vec::with_capacity(count);
        while order.len() < count {
            match done_rx.recv() {
                Ok(Ok(index)) => {
                    order.push(index);
                    tracing::debug!(fragment = index, done = order.len(), total = count, "fragment complete");
                    if let Some(tx) = &self.progress {
                        let _ = tx.try_send(ProgressStats {
                            bytes_done: shared.bytes_done.load(Ordering::Relaxed),
                            total_bytes: shared.plan.total_size(),
                            elapsed_secs: started.elapsed().as_secs_f64(),
                            fragments_done: order.len(),
                            fragment_count: count,
                        });
                    }
                }
                Ok(Err(failure)) => {
                    return Err(DownloadError::FragmentFailed {
                        index: failure.index,
                        attempts: failure.attempts,
                        source: failure.error,
                    }
                    .into());
                }
                Err(_) => {
                    return Err(DownloadError::WorkersGone {
                        remaining: count - order.len(),
                    }
                    .into());
                }
            }
        }
        Ok(order)
    }
}

/// The ranged pass failed because the server sends full bodies for ranged GETs.
fn ranges_ignored(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<DownloadError>(),
        Some(DownloadError::FragmentFailed { source, .. }) if source.ranges_unsupported()
    )
}

/// Ranged plan when the server reports a size and byte-range support, otherwise
/// one whole-resource fragment.
pub fn plan_for(head: &ProbeResult, concurrency: usize, chunk_size: u64) -> FragmentPlan {
    match head.content_length {
        Some(total) if head.accept_ranges => FragmentPlan::new(total, concurrency, chunk_size),
        size => FragmentPlan::whole(size, concurrency),
    }
}
