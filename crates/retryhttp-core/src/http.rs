//! Blocking HTTP GET over libcurl, with and without a retry policy.
//!
//! Non-2xx responses are returned as [`HttpError::Status`] so the retry
//! classifiers can see the status code and headers.

use crate::retry::{run_with_policy, Headers, HttpError, RetryPolicy};
use std::collections::HashMap;
use std::str;
use std::time::Duration;

/// Per-request transport settings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub connect_timeout: Duration,
    /// Whole-transfer timeout.
    pub timeout: Duration,
    pub follow_redirects: bool,
    /// Extra request headers (name, value).
    pub headers: HashMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(30),
            follow_redirects: true,
            headers: HashMap::new(),
        }
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs one GET. Runs in the current thread; call from `spawn_blocking`
/// if used from async code.
pub fn get(url: &str, opts: &RequestOptions) -> Result<Response, HttpError> {
    url::Url::parse(url).map_err(|e| HttpError::Other(format!("invalid URL {url}: {e}")))?;

    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(opts.follow_redirects)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.timeout)?;

    if !opts.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &opts.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()? as u16;
    let headers = Headers::from_lines(&header_lines);
    tracing::debug!(url, status, "GET finished");

    if !(200..300).contains(&status) {
        return Err(HttpError::Status { status, headers });
    }
    Ok(Response {
        status,
        headers,
        body,
    })
}

/// [`get`] under a retry policy. Returns the last failure if every allowed
/// attempt failed.
pub fn get_with_retry(
    url: &str,
    opts: &RequestOptions,
    policy: &RetryPolicy,
) -> Result<Response, HttpError> {
    run_with_policy(policy, || get(url, opts))
}
