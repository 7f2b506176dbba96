//! In-memory transport for unit tests: serves a fixed body, honours `Range`,
//! records every request and can script faults for chosen ranges.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use super::{Response, Transport};
use crate::request::{Method, Request};
use crate::retry::FragmentError;

/// What a scripted range answers instead of the real slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Fail with this HTTP status.
    Status(u32),
    /// 206 with the last byte missing.
    Short,
    /// 206 whose `Content-Range` is shifted by one byte.
    WrongRange,
    /// Panic inside `execute`.
    Panic,
}

pub(crate) struct MockTransport {
    body: Vec<u8>,
    pub(crate) advertise_ranges: bool,
    /// Answer ranged GETs with 200 and the whole body.
    pub(crate) ignore_ranges: bool,
    /// Range header value -> (fault, remaining count).
    faults: Mutex<HashMap<String, (Fault, u32)>>,
    /// Range header values in the order requests arrived ("" for unranged).
    pub(crate) log: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            advertise_ranges: true,
            ignore_ranges: false,
            faults: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fault(self, range: &str, fault: Fault, times: u32) -> Self {
        self.faults
            .lock()
            .unwrap()
            .insert(range.to_string(), (fault, times));
        self
    }

    /// Answer `range` with 503 `times` times.
    pub(crate) fn fail_range(self, range: &str, times: u32) -> Self {
        self.fault(range, Fault::Status(503), times)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn take_fault(&self, range: &str) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        let (fault, left) = faults.get_mut(range)?;
        if *left == 0 {
            return None;
        }
        *left -= 1;
        Some(*fault)
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: &Request,
        _timeout: Duration,
        body: &mut dyn Write,
    ) -> Result<Response, FragmentError> {
        let total = self.body.len();
        if request.method == Method::Head {
            let mut headers = vec![format!("Content-Length: {total}")];
            if self.advertise_ranges {
                headers.push("Accept-Ranges: bytes".to_string());
            }
            return Ok(Response {
                status: 200,
                headers,
                body_bytes: 0,
            });
        }

        let range = request.header("Range").unwrap_or("").to_string();
        self.log.lock().unwrap().push(range.clone());
        let fault = self.take_fault(&range);
        match fault {
            Some(Fault::Status(code)) => return Err(FragmentError::Http(code)),
            Some(Fault::Panic) => panic!("scripted transport panic for {range}"),
            _ => {}
        }

        let bounds = range
            .strip_prefix("bytes=")
            .and_then(|r| r.split_once('-'))
            .filter(|_| !self.ignore_ranges);
        let (status, start, end) = match bounds {
            Some((a, b)) => {
                let start: usize = a.parse().unwrap();
                let end = if b.is_empty() {
                    total
                } else {
                    (b.parse::<usize>().unwrap() + 1).min(total)
                };
                (206, start, end)
            }
            None => (200, 0, total),
        };
        let mut headers = vec![format!("Content-Length: {}", end - start)];
        if status == 206 {
            let shift = usize::from(fault == Some(Fault::WrongRange));
            headers.push(format!(
                "Content-Range: bytes {}-{}/{}",
                start + shift,
                end - 1 + shift,
                total
            ));
        }
        let served = if fault == Some(Fault::Short) {
            &self.body[start..end - 1]
        } else {
            &self.body[start..end]
        };
        body.write_all(served)?;
        Ok(Response {
            status,
            headers,
            body_bytes: served.len() as u64,
        })
    }
}
