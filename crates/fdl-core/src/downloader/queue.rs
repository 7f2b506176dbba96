//! Per-download coordination channels: work queue, retry channel and feeder.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};

/// Message on the retry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requeue {
    /// A failed fragment to put back into circulation.
    Fragment(usize),
    /// Sent by the orchestrator once it no longer needs the feeder.
    Shutdown,
}

/// Receiving end of the work queue, shared by all workers.
pub(crate) struct WorkQueue {
    rx: Mutex<Receiver<usize>>,
}

impl WorkQueue {
    /// Block until an index is available. `None` once the feeder is gone and the queue is empty.
    pub(crate) fn take(&self) -> Option<usize> {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        rx.recv().ok()
    }
}

/// Bounded channels owned by one download.
pub(crate) struct FragmentQueues {
    pub(crate) work_tx: SyncSender<usize>,
    pub(crate) work: WorkQueue,
    pub(crate) retry_tx: SyncSender<Requeue>,
    pub(crate) retry_rx: Receiver<Requeue>,
}

impl FragmentQueues {
    /// Work queue holds `concurrency` indices; the retry channel `concurrency / 2`
    /// (zero makes it a rendezvous channel).
    pub(crate) fn new(concurrency: usize) -> Self {
        let (work_tx, work_rx) = mpsc::sync_channel(concurrency);
        let (retry_tx, retry_rx) = mpsc::sync_channel(concurrency / 2);
        Self {
            work_tx,
            work: WorkQueue {
                rx: Mutex::new(work_rx),
            },
            retry_tx,
            retry_rx,
        }
    }
}

/// Feeder loop: publish `0..fragment_count`, then relay retried indices onto the
/// work queue until `Shutdown` arrives or every retry sender is dropped.
///
/// Dropping `work_tx` on return is what lets idle workers exit.
pub(crate) fn feed(work_tx: SyncSender<usize>, retry_rx: Receiver<Requeue>, fragment_count: usize) {
    for index in 0..fragment_count {
        if work_tx.send(index).is_err() {
            return;
        }
    }
    tracing::debug!(fragments = fragment_count, "all fragments queued");

    while let Ok(Requeue::Fragment(index)) = retry_rx.recv() {
        tracing::debug!(fragment = index, "requeue fragment");
        if work_tx.send(index).is_err() {
            return;
        }
    }
}
