//! Classify fragment errors for logs and the run summary.

use super::error::FragmentError;
use super::policy::ErrorKind;

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

pub fn classify(e: &FragmentError) -> ErrorKind {
    match e {
        FragmentError::Curl(ce) => classify_curl_error(ce),
        FragmentError::Http(code) => classify_http_status(*code),
        FragmentError::Storage(_) => ErrorKind::Storage,
        FragmentError::RangeIgnored(_)
        | FragmentError::RangeMismatch { .. }
        | FragmentError::PartialTransfer { .. }
        | FragmentError::Overrun { .. }
        | FragmentError::Panicked(_) => ErrorKind::Other,
    }
}
