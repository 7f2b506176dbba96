//! libcurl-backed transport.

use std::io::Write;
use std::str;
use std::time::Duration;

use super::{Response, Transport};
use crate::request::{Method, Request};
use crate::retry::FragmentError;

/// Transport using one fresh `curl::easy::Easy` handle per request.
#[derive(Debug, Clone, Copy)]
pub struct CurlTransport {
    /// Maximum redirects followed per request.
    pub max_redirections: u32,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            max_redirections: 10,
        }
    }
}

impl Transport for CurlTransport {
    fn execute(
        &self,
        request: &Request,
        timeout: Duration,
        body: &mut dyn Write,
    ) -> Result<Response, FragmentError> {
        let mut headers: Vec<String> = Vec::new();
        let mut body_bytes = 0u64;
        let mut sink_error: Option<std::io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url)?;
        easy.nobody(request.method == Method::Head)?;
        easy.follow_location(true)?;
        easy.max_redirections(self.max_redirections)?;
        easy.connect_timeout(timeout)?;
        easy.timeout(timeout)?;

        let mut list = curl::easy::List::new();
        for line in request.header_lines() {
            list.append(&line)?;
        }
        if !request.headers().is_empty() {
            easy.http_headers(list)?;
        }

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    // A new status line starts the headers of a redirect target.
                    if line.starts_with("HTTP/") {
                        headers.clear();
                    }
                    if !line.is_empty() {
                        headers.push(line.to_string());
                    }
                }
                true
            })?;
            transfer.write_function(|data| match body.write_all(data) {
                Ok(()) => {
                    body_bytes += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    sink_error = Some(e);
                    Ok(0)
                }
            })?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if e.is_write_error() {
                if let Some(io_err) = sink_error.take() {
                    return Err(FragmentError::Storage(io_err));
                }
            }
            return Err(FragmentError::Curl(e));
        }

        Ok(Response {
            status: easy.response_code()?,
            headers,
            body_bytes,
        })
    }
}
