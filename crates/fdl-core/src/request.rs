//! Request template shared by workers and the per-fragment requests built from it.

use anyhow::{Context, Result};

/// HTTP method used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// Immutable base request (method, URL, headers).
///
/// Shared read-only between workers; each worker calls [`RequestTemplate::instantiate`]
/// to get its own mutable copy before setting a per-fragment `Range` header.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
}

impl RequestTemplate {
    /// GET template for `url`. Fails if the URL does not parse.
    pub fn get(url: &str) -> Result<Self> {
        url::Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
        Ok(Self {
            method: Method::Get,
            url: url.to_string(),
            headers: Vec::new(),
        })
    }

    /// Adds a header sent with every request (probe and fragments).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Copies method, URL and headers into an owned request. Nothing else is shared.
    pub fn instantiate(&self) -> Request {
        Request {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// A single request owned by one worker (or the prober).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Sets a header, replacing any existing value with the same (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    /// Value of header `name`, if set.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Header lines in `Name: value` form, as handed to the transport.
    pub fn header_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k.trim(), v.trim()))
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
    {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
