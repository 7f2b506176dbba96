//! Per-attempt fragment error type.

use thiserror::Error;

/// Why one attempt at fetching a fragment failed.
///
/// The worker classifies it, logs it and requeues the fragment; once the retry
/// budget runs out it surfaces as the source of `DownloadError::FragmentFailed`.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Server answered a ranged request with a full (non-206) response.
    #[error("range ignored: HTTP {0} instead of 206")]
    RangeIgnored(u32),
    /// `Content-Range` of a 206 response names other bytes than requested.
    #[error("content-range mismatch: asked for {expected}, got {got}")]
    RangeMismatch { expected: String, got: String },
    /// Body length differs from the planned fragment length (e.g. server closed early).
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Body ran past the fragment length before the transfer ended.
    #[error("response overran the requested {limit} bytes")]
    Overrun { limit: u64 },
    /// Fragment file create/write failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// The transport panicked during the attempt.
    #[error("transport panicked: {0}")]
    Panicked(String),
}

impl FragmentError {
    /// The server answered a ranged request with more than the range: a full
    /// 200 body or an overrun. Every other fragment will see the same.
    pub fn ranges_unsupported(&self) -> bool {
        matches!(self, FragmentError::RangeIgnored(_) | FragmentError::Overrun { .. })
    }

    /// False for failures that repeat identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        !self.ranges_unsupported() && !matches!(self, FragmentError::Panicked(_))
    }
}
