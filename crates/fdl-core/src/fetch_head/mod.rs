//! HTTP HEAD / metadata probing.
//!
//! One HEAD request (no body) before planning: `Content-Length` gives the total
//! size, `Accept-Ranges: bytes` says whether fragments can be fetched with Range.
//! ETag, Last-Modified and Content-Disposition are captured for the CLI.

mod parse;

use anyhow::{Context, Result};
use std::io;
use std::time::Duration;

use crate::request::{Method, RequestTemplate};
use crate::transport::Transport;

pub(crate) use parse::parse_content_range;

/// Key headers from the probe response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

/// Sends a HEAD for `template` and parses the response headers.
///
/// Transport errors and non-2xx statuses are fatal: the caller aborts the download.
pub fn probe<T: Transport>(
    transport: &T,
    template: &RequestTemplate,
    timeout: Duration,
) -> Result<ProbeResult> {
    let mut request = template.instantiate();
    request.method = Method::Head;
    let response = transport
        .execute(&request, timeout, &mut io::sink())
        .with_context(|| format!("HEAD {} failed", template.url()))?;
    if !response.is_success() {
        anyhow::bail!("HEAD {} returned HTTP {}", template.url(), response.status);
    }
    let result = parse::parse_headers(&response.headers);
    tracing::info!(
        url = template.url(),
        size = ?result.content_length,
        ranges = result.accept_ranges,
        "probed resource"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn probe_reads_size_and_range_support() {
        let transport = MockTransport::new(vec![7u8; 1234]);
        let template = RequestTemplate::get("http://example.com/a.bin").unwrap();
        let r = probe(&transport, &template, Duration::from_secs(5)).unwrap();
        assert_eq!(r.content_length, Some(1234));
        assert!(r.accept_ranges);
        assert!(transport.requests().is_empty(), "HEAD must not fetch a body");
    }

    #[test]
    fn probe_without_accept_ranges() {
        let mut transport = MockTransport::new(vec![0u8; 10]);
        transport.advertise_ranges = false;
        let template = RequestTemplate::get("http://example.com/a.bin").unwrap();
        let r = probe(&transport, &template, Duration::from_secs(5)).unwrap();
        assert_eq!(r.content_length, Some(10));
        assert!(!r.accept_ranges);
    }
}
