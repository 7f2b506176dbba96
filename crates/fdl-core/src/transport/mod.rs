//! HTTP transport seam.
//!
//! The engine only needs "send this request, stream the body into that writer,
//! tell me the status and headers". [`CurlTransport`] does it with libcurl;
//! tests plug in their own implementations to inject faults.

mod easy;
#[cfg(test)]
pub(crate) mod mock;

pub use easy::CurlTransport;

use std::io::Write;
use std::time::Duration;

use crate::request::Request;
use crate::retry::FragmentError;

/// Status line, headers and body size of a completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    /// Raw header lines of the final response (after redirects), without CRLF.
    pub headers: Vec<String>,
    /// Bytes handed to the body sink.
    pub body_bytes: u64,
}

impl Response {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP request.
///
/// Implementations must be shareable across worker threads. Each call is
/// bounded by `timeout`. The body (if any) is written to `body`; a write error
/// aborts the transfer and is reported as [`FragmentError::Storage`].
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &Request,
        timeout: Duration,
        body: &mut dyn Write,
    ) -> Result<Response, FragmentError>;
}
