//! Fatal download errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::retry::FragmentError;

/// Outcomes that abort a download. Carried inside `anyhow::Error`; callers can
/// `downcast_ref::<DownloadError>()` to tell them apart from setup failures.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("output already exists: {} (use overwrite to replace)", .0.display())]
    OutputExists(PathBuf),
    /// A fragment used up its retry budget or failed in a way a retry cannot fix.
    #[error("fragment {index} failed after {attempts} attempt(s)")]
    FragmentFailed {
        index: usize,
        attempts: u32,
        #[source]
        source: FragmentError,
    },
    /// Every worker exited before all fragments completed.
    #[error("all workers exited with {remaining} fragment(s) outstanding")]
    WorkersGone { remaining: usize },
    #[error("worker thread panicked")]
    WorkerPanicked,
}
