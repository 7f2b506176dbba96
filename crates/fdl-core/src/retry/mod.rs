//! Retry and backoff policy.
//!
//! Error classification (timeouts, throttling, connection failures) plus the
//! exponential backoff decision the workers consult after each failed attempt.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FragmentError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
