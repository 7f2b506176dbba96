//! Worker loop: take a fragment index, fetch its range into the fragment file,
//! then signal completion or requeue it.

use std::any::Any;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::time::{Duration, Instant};

use crate::fetch_head::parse_content_range;
use crate::request::RequestTemplate;
use crate::retry::{classify, ErrorKind, FragmentError, RetryDecision, RetryPolicy};
use crate::segmenter::{Fragment, FragmentPlan};
use crate::storage;
use crate::transport::Transport;

use super::queue::{Requeue, WorkQueue};

/// A fragment that ran out of attempts.
#[derive(Debug)]
pub(crate) struct FragmentFailure {
    pub(crate) index: usize,
    pub(crate) attempts: u32,
    pub(crate) error: FragmentError,
}

/// Message on the completion barrier.
pub(crate) type Completion = Result<usize, FragmentFailure>;

/// State shared read-only (or atomically) by every worker of one download.
pub(crate) struct WorkerShared<'a, T> {
    pub(crate) transport: &'a T,
    pub(crate) template: &'a RequestTemplate,
    pub(crate) plan: &'a FragmentPlan,
    pub(crate) output: &'a Path,
    pub(crate) timeout: Duration,
    pub(crate) policy: RetryPolicy,
    /// Failed attempts per fragment index.
    pub(crate) attempts: Vec<AtomicU32>,
    /// Set on fatal failure; workers then drain the queue without fetching.
    pub(crate) cancel: AtomicBool,
    pub(crate) bytes_done: AtomicU64,
    pub(crate) throttle_events: AtomicU32,
    pub(crate) error_events: AtomicU32,
}

impl<'a, T: Transport> WorkerShared<'a, T> {
    pub(crate) fn new(
        transport: &'a T,
        template: &'a RequestTemplate,
        plan: &'a FragmentPlan,
        output: &'a Path,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            template,
            plan,
            output,
            timeout,
            policy,
            attempts: (0..plan.fragment_count()).map(|_| AtomicU32::new(0)).collect(),
            cancel: AtomicBool::new(false),
            bytes_done: AtomicU64::new(0),
            throttle_events: AtomicU32::new(0),
            error_events: AtomicU32::new(0),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Runs until the work queue closes.
///
/// A failed fragment goes back through the retry channel after its backoff.
/// When that channel is full the worker keeps the fragment and tries it again
/// itself, so a burst of failures cannot wedge every worker on a full channel.
/// Failures that would repeat on every attempt (ignored ranges, a panicking
/// transport) go straight to the barrier.
pub(crate) fn run_worker<T: Transport>(
    id: usize,
    shared: &WorkerShared<'_, T>,
    work: &WorkQueue,
    retry_tx: SyncSender<Requeue>,
    done_tx: SyncSender<Completion>,
) {
    while let Some(index) = work.take() {
        loop {
            if shared.cancelled() {
                break;
            }
            let fragment = shared.plan.fragment(index);
            let attempt_result =
                panic::catch_unwind(AssertUnwindSafe(|| fetch_fragment(id, shared, fragment)))
                    .unwrap_or_else(|payload| Err(FragmentError::Panicked(panic_message(&*payload))));
            let error = match attempt_result {
                Ok(_) => {
                    let _ = done_tx.send(Ok(index));
                    break;
                }
                Err(e) => e,
            };

            let attempt = shared.attempts[index].fetch_add(1, Ordering::Relaxed) + 1;
            let kind = classify(&error);
            match kind {
                ErrorKind::Throttled => shared.throttle_events.fetch_add(1, Ordering::Relaxed),
                _ => shared.error_events.fetch_add(1, Ordering::Relaxed),
            };

            let decision = if error.is_retryable() {
                shared.policy.decide(attempt)
            } else {
                RetryDecision::NoRetry
            };
            match decision {
                RetryDecision::NoRetry => {
                    tracing::error!(worker = id, fragment = index, attempt, ?kind, "giving up: {}", error);
                    let _ = done_tx.send(Err(FragmentFailure {
                        index,
                        attempts: attempt,
                        error,
                    }));
                    break;
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        worker = id,
                        fragment = index,
                        attempt,
                        ?kind,
                        delay_ms = delay.as_millis() as u64,
                        "fragment failed, will retry: {}",
                        error
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    match retry_tx.try_send(Requeue::Fragment(index)) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => break,
                        Err(TrySendError::Full(_)) => {
                            tracing::debug!(worker = id, fragment = index, "retry channel full, keeping fragment");
                        }
                    }
                }
            }
        }
    }
    tracing::trace!(worker = id, "worker exiting");
}

/// One attempt: ranged GET into `<output>_<index>`, then verify status and length.
/// Returns the number of bytes written.
fn fetch_fragment<T: Transport>(
    id: usize,
    shared: &WorkerShared<'_, T>,
    fragment: Fragment,
) -> Result<u64, FragmentError> {
    let started = Instant::now();
    let ranged = shared.plan.is_ranged();
    let mut request = shared.template.instantiate();
    if ranged {
        request.set_header("Range", &fragment.range_header_value());
    }
    tracing::debug!(
        worker = id,
        fragment = fragment.index,
        start = fragment.start,
        end = ?fragment.end,
        "start download"
    );

    let path = storage::fragment_path(shared.output, fragment.index);
    let limit = if ranged { fragment.len() } else { None };
    let mut sink = FragmentSink::new(File::create(&path)?, limit);
    let executed = shared.transport.execute(&request, shared.timeout, &mut sink);
    if let (true, Some(limit)) = (sink.overran, limit) {
        return Err(FragmentError::Overrun { limit });
    }
    let response = executed?;
    sink.inner.flush()?;
    drop(sink);

    if let Some(content_range) = response.header("Content-Range") {
        tracing::debug!(worker = id, fragment = fragment.index, content_range, "response");
    }
    if !response.is_success() {
        return Err(FragmentError::Http(response.status));
    }
    if ranged {
        if response.status != 206 {
            return Err(FragmentError::RangeIgnored(response.status));
        }
        if let Some(got) = response.header("Content-Range") {
            let matches = parse_content_range(got)
                .map(|(s, e)| Some(e) == fragment.end && s == fragment.start)
                .unwrap_or(false);
            if !matches {
                return Err(FragmentError::RangeMismatch {
                    expected: fragment.range_header_value(),
                    got: got.to_string(),
                });
            }
        }
    }
    if let Some(expected) = fragment.len() {
        if response.body_bytes != expected {
            return Err(FragmentError::PartialTransfer {
                expected,
                received: response.body_bytes,
            });
        }
    }

    shared
        .bytes_done
        .fetch_add(response.body_bytes, Ordering::Relaxed);
    let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
    tracing::debug!(
        worker = id,
        fragment = fragment.index,
        bytes = response.body_bytes,
        kib_per_sec = response.body_bytes as f64 / secs / 1024.0,
        "download successful"
    );
    Ok(response.body_bytes)
}

/// Fragment file writer that refuses bytes past the fragment length, so a
/// server sending the whole resource is cut off early.
struct FragmentSink {
    inner: BufWriter<File>,
    limit: Option<u64>,
    written: u64,
    overran: bool,
}

impl FragmentSink {
    fn new(file: File, limit: Option<u64>) -> Self {
        Self {
            inner: BufWriter::new(file),
            limit,
            written: 0,
            overran: false,
        }
    }
}

impl Write for FragmentSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.limit {
            if self.written + buf.len() as u64 > limit {
                self.overran = true;
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("body overran fragment length {limit}"),
                ));
            }
        }
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
