//! Failure model inspected by the classifiers and wait selectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response headers in arrival order. Lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Repeated names are kept; `get` returns the first.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared ASCII case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse raw header lines (as delivered by libcurl's header callback).
    /// Status lines and blank lines are skipped. A new status line (redirect
    /// or `100 Continue`) discards the headers collected so far.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut headers = Headers::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("HTTP/") {
                headers.entries.clear();
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Concrete kind of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Connect,
    Read,
    Write,
    /// Failure while closing the connection.
    Close,
    ConnectTimeout,
    ReadTimeout,
    WriteTimeout,
    /// Timed out waiting for a pooled connection.
    PoolTimeout,
    Protocol,
    Other,
}

impl TransportKind {
    pub fn is_timeout(self) -> bool {
        matches!(
            self,
            TransportKind::ConnectTimeout
                | TransportKind::ReadTimeout
                | TransportKind::WriteTimeout
                | TransportKind::PoolTimeout
        )
    }

    /// Connect/read/write/close failures. Timeouts are not network errors.
    pub fn is_network(self) -> bool {
        matches!(
            self,
            TransportKind::Connect
                | TransportKind::Read
                | TransportKind::Write
                | TransportKind::Close
        )
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Connect => "connect error",
            TransportKind::Read => "read error",
            TransportKind::Write => "write error",
            TransportKind::Close => "close error",
            TransportKind::ConnectTimeout => "connect timeout",
            TransportKind::ReadTimeout => "read timeout",
            TransportKind::WriteTimeout => "write timeout",
            TransportKind::PoolTimeout => "pool timeout",
            TransportKind::Protocol => "protocol error",
            TransportKind::Other => "transport error",
        };
        f.write_str(s)
    }
}

/// Failure of one HTTP attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16, headers: Headers },
    /// The request never produced a response.
    #[error("{kind}: {message}")]
    Transport { kind: TransportKind, message: String },
    /// Anything else; never classified as retryable.
    #[error("{0}")]
    Other(String),
}

impl HttpError {
    pub fn status(status: u16) -> Self {
        HttpError::Status {
            status,
            headers: Headers::new(),
        }
    }

    pub fn status_with_headers(status: u16, headers: Headers) -> Self {
        HttpError::Status { status, headers }
    }

    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        HttpError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Status code, if this is a status-carrying error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response headers, if this is a status-carrying error.
    pub fn headers(&self) -> Option<&Headers> {
        match self {
            HttpError::Status { headers, .. } => Some(headers),
            _ => None,
        }
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            HttpError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Map a libcurl failure onto a transport kind.
///
/// libcurl reports connect and transfer timeouts with the same code, so both
/// land on `ReadTimeout`.
pub fn transport_kind_of(e: &curl::Error) -> TransportKind {
    if e.is_operation_timedout() {
        return TransportKind::ReadTimeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_ssl_connect_error()
    {
        return TransportKind::Connect;
    }
    if e.is_read_error() || e.is_recv_error() || e.is_got_nothing() || e.is_partial_file() {
        return TransportKind::Read;
    }
    if e.is_send_error() {
        return TransportKind::Write;
    }
    if e.is_unsupported_protocol() || e.is_url_malformed() || e.is_too_many_redirects() {
        return TransportKind::Protocol;
    }
    TransportKind::Other
}

impl From<curl::Error> for HttpError {
    fn from(e: curl::Error) -> Self {
        HttpError::Transport {
            kind: transport_kind_of(&e),
            message: e.to_string(),
        }
    }
}
