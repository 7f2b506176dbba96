//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body. HEAD answers with Content-Length and (optionally)
//! Accept-Ranges; ranged GETs get 206 with Content-Range. Chosen fragments can
//! be made to fail with 503 a fixed number of times.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If true, HEAD returns 405.
    pub block_head: bool,
    /// If true, GET ignores Range and always returns 200 with the full body
    /// (HEAD still advertises ranges unless `hide_accept_ranges` is set).
    pub ignore_ranges: bool,
    /// If true, omit `Accept-Ranges: bytes` from HEAD.
    pub hide_accept_ranges: bool,
    /// `start offset -> count`: ranged GETs starting there get 503 this many times.
    pub fail_first: HashMap<u64, usize>,
}

/// Handle to a running server.
pub struct RangeServer {
    pub url: String,
    gets: Arc<AtomicUsize>,
    ranges: Arc<Mutex<Vec<String>>>,
}

impl RangeServer {
    /// Number of GET requests served (including injected failures).
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Range header values seen on GETs ("" when absent).
    pub fn ranges(&self) -> Vec<String> {
        self.ranges.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread serving `body` at `/<name>`. The
/// server runs until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(opts.fail_first.clone()));
    let opts = Arc::new(opts);
    {
        let gets = Arc::clone(&gets);
        let ranges = Arc::clone(&ranges);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = ConnState {
                    body: Arc::clone(&body),
                    opts: Arc::clone(&opts),
                    gets: Arc::clone(&gets),
                    ranges: Arc::clone(&ranges),
                    failures: Arc::clone(&failures),
                };
                thread::spawn(move || handle(stream, &state));
            }
        });
    }
    RangeServer {
        url: format!("http://127.0.0.1:{}/payload.bin", port),
        gets,
        ranges,
    }
}

struct ConnState {
    body: Arc<Vec<u8>>,
    opts: Arc<RangeServerOptions>,
    gets: Arc<AtomicUsize>,
    ranges: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<u64, usize>>>,
}

fn handle(mut stream: TcpStream, state: &ConnState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, raw_range, range) = parse_request(request);
    let body = state.body.as_slice();
    let total = body.len() as u64;
    let opts = &state.opts;

    if method.eq_ignore_ascii_case("HEAD") {
        if opts.block_head {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let accept_ranges = if opts.hide_accept_ranges {
            ""
        } else {
            "Accept-Ranges: bytes\r\n"
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}ETag: \"fixture\"\r\n\r\n",
            total, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    state.gets.fetch_add(1, Ordering::SeqCst);
    state.ranges.lock().unwrap().push(raw_range.to_string());

    if let Some((start, _)) = range {
        let mut failures = state.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&start) {
            if *left > 0 {
                *left -= 1;
                let _ = stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
                return;
            }
        }
    }

    let (status, content_range, slice) = match range {
        Some((start, end_incl)) if !opts.ignore_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl || start >= total {
                ("416 Range Not Satisfiable", format!("bytes */{}", total), &body[0..0])
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("bytes {}-{}/{}", start, end_incl, total),
                    slice,
                )
            }
        }
        _ => (
            "200 OK",
            format!("bytes 0-{}/{}", total.saturating_sub(1), total),
            body,
        ),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Range: {}\r\n\r\n",
        status,
        slice.len(),
        content_range
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

/// Returns (method, raw Range value, parsed (start, end_inclusive)).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut method = "";
    let mut raw = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                raw = value.trim();
                if let Some(spec) = raw.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, raw, range)
}
