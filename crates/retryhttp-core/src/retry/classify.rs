//! Classify attempt failures into retry categories.
//!
//! Four independent predicates (rate limited, server error, network error,
//! network timeout) plus [`RetryCondition`], the value form of those predicates
//! that a policy ORs together.

use super::attempt::{Attempt, AttemptOutcome};
use super::error::{HttpError, TransportKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// 429 Too Many Requests.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Potentially transient 5xx statuses: 500, 502, 503, 504.
pub const DEFAULT_SERVER_ERROR_CODES: [u16; 4] = [500, 502, 503, 504];

/// Close errors are rarely worth retrying, so they are left out.
pub const DEFAULT_NETWORK_ERRORS: [ErrorClass; 3] =
    [ErrorClass::Connect, ErrorClass::Read, ErrorClass::Write];

pub const DEFAULT_NETWORK_TIMEOUTS: [ErrorClass; 1] = [ErrorClass::Timeout];

/// Retry category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    RateLimited,
    ServerError,
    NetworkError,
    NetworkTimeout,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::RateLimited => "rate limited",
            Category::ServerError => "server error",
            Category::NetworkError => "network error",
            Category::NetworkTimeout => "network timeout",
        })
    }
}

/// Set of status codes counted as retryable server errors.
///
/// Immutable once built: there are no mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeSet(BTreeSet<u16>);

impl StatusCodeSet {
    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StatusCodeSet {
    fn default() -> Self {
        DEFAULT_SERVER_ERROR_CODES.into()
    }
}

/// A single code becomes a one-element set.
impl From<u16> for StatusCodeSet {
    fn from(code: u16) -> Self {
        Self(BTreeSet::from([code]))
    }
}

impl<const N: usize> From<[u16; N]> for StatusCodeSet {
    fn from(codes: [u16; N]) -> Self {
        Self(codes.into_iter().collect())
    }
}

impl From<Vec<u16>> for StatusCodeSet {
    fn from(codes: Vec<u16>) -> Self {
        Self(codes.into_iter().collect())
    }
}

impl FromIterator<u16> for StatusCodeSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Failure-type identifier used in network error / timeout sets.
///
/// Every [`TransportKind`] has a class of its own; `Network` and `Timeout`
/// match whole families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    Connect,
    Read,
    Write,
    Close,
    ConnectTimeout,
    ReadTimeout,
    WriteTimeout,
    PoolTimeout,
    Protocol,
    Other,
    /// Any connect, read, write or close error.
    Network,
    /// Any timeout.
    Timeout,
}

impl ErrorClass {
    pub fn matches(self, kind: TransportKind) -> bool {
        match self {
            ErrorClass::Network => kind.is_network(),
            ErrorClass::Timeout => kind.is_timeout(),
            ErrorClass::Connect => kind == TransportKind::Connect,
            ErrorClass::Read => kind == TransportKind::Read,
            ErrorClass::Write => kind == TransportKind::Write,
            ErrorClass::Close => kind == TransportKind::Close,
            ErrorClass::ConnectTimeout => kind == TransportKind::ConnectTimeout,
            ErrorClass::ReadTimeout => kind == TransportKind::ReadTimeout,
            ErrorClass::WriteTimeout => kind == TransportKind::WriteTimeout,
            ErrorClass::PoolTimeout => kind == TransportKind::PoolTimeout,
            ErrorClass::Protocol => kind == TransportKind::Protocol,
            ErrorClass::Other => kind == TransportKind::Other,
        }
    }
}

/// Set of failure-type identifiers. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassSet(BTreeSet<ErrorClass>);

impl ErrorClassSet {
    /// Default set for network errors (connect, read, write).
    pub fn network_errors() -> Self {
        DEFAULT_NETWORK_ERRORS.into()
    }

    /// Default set for network timeouts (every timeout).
    pub fn network_timeouts() -> Self {
        DEFAULT_NETWORK_TIMEOUTS.into()
    }

    /// True if any class in the set matches `kind`.
    pub fn matches(&self, kind: TransportKind) -> bool {
        self.0.iter().any(|c| c.matches(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = ErrorClass> + '_ {
        self.0.iter().copied()
    }
}

impl From<ErrorClass> for ErrorClassSet {
    fn from(class: ErrorClass) -> Self {
        Self(BTreeSet::from([class]))
    }
}

impl<const N: usize> From<[ErrorClass; N]> for ErrorClassSet {
    fn from(classes: [ErrorClass; N]) -> Self {
        Self(classes.into_iter().collect())
    }
}

impl From<Vec<ErrorClass>> for ErrorClassSet {
    fn from(classes: Vec<ErrorClass>) -> Self {
        Self(classes.into_iter().collect())
    }
}

impl FromIterator<ErrorClass> for ErrorClassSet {
    fn from_iter<I: IntoIterator<Item = ErrorClass>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn failure_of<'a>(outcome: &AttemptOutcome<'a>) -> Option<&'a HttpError> {
    outcome.failure()
}

/// True iff the failure is an HTTP 429.
pub fn is_rate_limited(outcome: &AttemptOutcome<'_>) -> bool {
    failure_of(outcome).and_then(HttpError::status_code) == Some(TOO_MANY_REQUESTS)
}

/// True iff the failure carries a status code in `codes`.
pub fn is_server_error(outcome: &AttemptOutcome<'_>, codes: &StatusCodeSet) -> bool {
    failure_of(outcome)
        .and_then(HttpError::status_code)
        .is_some_and(|code| codes.contains(code))
}

/// True iff the failure is a transport failure matched by `errors`.
pub fn is_network_error(outcome: &AttemptOutcome<'_>, errors: &ErrorClassSet) -> bool {
    transport_matches(outcome, errors)
}

/// True iff the failure is a transport failure matched by `timeouts`.
pub fn is_network_timeout(outcome: &AttemptOutcome<'_>, timeouts: &ErrorClassSet) -> bool {
    transport_matches(outcome, timeouts)
}

fn transport_matches(outcome: &AttemptOutcome<'_>, classes: &ErrorClassSet) -> bool {
    failure_of(outcome)
        .and_then(HttpError::transport_kind)
        .is_some_and(|kind| classes.matches(kind))
}

/// User-supplied retry predicate.
pub type RetryFn = dyn Fn(&Attempt<'_>) -> bool + Send + Sync;

/// Decides whether a finished attempt should be retried.
#[derive(Clone)]
pub enum RetryCondition {
    RateLimited,
    ServerError(StatusCodeSet),
    NetworkError(ErrorClassSet),
    NetworkTimeout(ErrorClassSet),
    /// Logical OR. Empty = never retry.
    Any(Vec<RetryCondition>),
    Custom(Arc<RetryFn>),
}

impl RetryCondition {
    pub fn server_error() -> Self {
        RetryCondition::ServerError(StatusCodeSet::default())
    }

    pub fn network_error() -> Self {
        RetryCondition::NetworkError(ErrorClassSet::network_errors())
    }

    pub fn network_timeout() -> Self {
        RetryCondition::NetworkTimeout(ErrorClassSet::network_timeouts())
    }

    pub fn any(conditions: impl IntoIterator<Item = RetryCondition>) -> Self {
        RetryCondition::Any(conditions.into_iter().collect())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Attempt<'_>) -> bool + Send + Sync + 'static,
    {
        RetryCondition::Custom(Arc::new(f))
    }

    pub fn should_retry(&self, attempt: &Attempt<'_>) -> bool {
        let outcome = &attempt.outcome;
        match self {
            RetryCondition::RateLimited => is_rate_limited(outcome),
            RetryCondition::ServerError(codes) => is_server_error(outcome, codes),
            RetryCondition::NetworkError(errors) => is_network_error(outcome, errors),
            RetryCondition::NetworkTimeout(timeouts) => is_network_timeout(outcome, timeouts),
            RetryCondition::Any(children) => children.iter().any(|c| c.should_retry(attempt)),
            RetryCondition::Custom(f) => f(attempt),
        }
    }
}

impl fmt::Debug for RetryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCondition::RateLimited => f.write_str("RateLimited"),
            RetryCondition::ServerError(codes) => f.debug_tuple("ServerError").field(codes).finish(),
            RetryCondition::NetworkError(e) => f.debug_tuple("NetworkError").field(e).finish(),
            RetryCondition::NetworkTimeout(t) => f.debug_tuple("NetworkTimeout").field(t).finish(),
            RetryCondition::Any(children) => f.debug_tuple("Any").field(children).finish(),
            RetryCondition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
