//! Wait strategies: backoff primitives, the header-driven wait and the
//! per-category dispatcher.
//!
//! Every strategy returns a non-negative [`Duration`] and never fails; bad
//! input (an unparsable header, an overflowing exponent) degrades to a
//! fallback or to the configured cap.

use super::attempt::Attempt;
use super::classify::{
    is_network_error, is_network_timeout, is_rate_limited, is_server_error, Category,
    ErrorClassSet, StatusCodeSet,
};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Upper bound used by the default backoffs.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15);

/// Header carrying the server's wait hint for 429 responses.
pub const RETRY_AFTER: &str = "Retry-After";

/// Computes how long to pause before the next attempt.
pub trait WaitStrategy: fmt::Debug + Send + Sync {
    fn wait(&self, attempt: &Attempt<'_>) -> Duration;
}

/// Shared, immutable wait strategy.
pub type SharedWait = Arc<dyn WaitStrategy>;

/// Clamp a computed delay in seconds into `[min, max]`. NaN and overflow land on `max`.
fn clamp_secs(secs: f64, min: Duration, max: Duration) -> Duration {
    if secs.is_nan() {
        return max;
    }
    let d = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(max);
    d.clamp(min, max.max(min))
}

fn exponent(base: f64, attempt: u32) -> f64 {
    base.powf(f64::from(attempt.saturating_sub(1)))
}

/// Same delay every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFixed(pub Duration);

impl WaitStrategy for WaitFixed {
    fn wait(&self, _attempt: &Attempt<'_>) -> Duration {
        self.0
    }
}

/// `multiplier * exp_base^(attempt - 1)` seconds, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitExponential {
    pub multiplier: f64,
    pub exp_base: f64,
    pub min: Duration,
    pub max: Duration,
}

impl Default for WaitExponential {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            exp_base: 2.0,
            min: Duration::ZERO,
            max: DEFAULT_MAX_WAIT,
        }
    }
}

impl WaitStrategy for WaitExponential {
    fn wait(&self, attempt: &Attempt<'_>) -> Duration {
        let secs = self.multiplier * exponent(self.exp_base, attempt.number);
        clamp_secs(secs, self.min, self.max)
    }
}

/// `initial * exp_base^(attempt - 1) + uniform(0, jitter)` seconds, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitExponentialJitter {
    pub initial: Duration,
    pub exp_base: f64,
    pub jitter: Duration,
    pub max: Duration,
}

impl Default for WaitExponentialJitter {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            exp_base: 2.0,
            jitter: Duration::from_secs(1),
            max: DEFAULT_MAX_WAIT,
        }
    }
}

impl WaitStrategy for WaitExponentialJitter {
    fn wait(&self, attempt: &Attempt<'_>) -> Duration {
        let base = self.initial.as_secs_f64() * exponent(self.exp_base, attempt.number);
        let jitter = rand::thread_rng().gen::<f64>() * self.jitter.as_secs_f64();
        clamp_secs(base + jitter, Duration::ZERO, self.max)
    }
}

/// Parse a wait hint: non-negative seconds (fractions allowed) or an HTTP-date.
pub fn parse_wait_hint(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(now).unwrap_or(Duration::ZERO))
}

/// Wait for the number of seconds named by a response header; use `fallback`
/// when the failure has no response, the header is missing, or its value
/// does not parse.
#[derive(Debug, Clone)]
pub struct WaitFromHeader {
    pub header: String,
    pub fallback: SharedWait,
}

impl WaitFromHeader {
    pub fn new(header: impl Into<String>, fallback: SharedWait) -> Self {
        Self {
            header: header.into(),
            fallback,
        }
    }

    /// `Retry-After` with the default jittered backoff as fallback.
    pub fn retry_after() -> Self {
        Self::new(RETRY_AFTER, Arc::new(WaitExponentialJitter::default()))
    }

    fn hint(&self, attempt: &Attempt<'_>) -> Option<Duration> {
        let value = attempt.failure()?.headers()?.get(&self.header)?;
        let parsed = parse_wait_hint(value, SystemTime::now());
        if parsed.is_none() {
            tracing::debug!(
                header = %self.header,
                value,
                "unusable wait hint, using fallback"
            );
        }
        parsed
    }
}

impl WaitStrategy for WaitFromHeader {
    fn wait(&self, attempt: &Attempt<'_>) -> Duration {
        self.hint(attempt)
            .unwrap_or_else(|| self.fallback.wait(attempt))
    }
}

/// Picks the wait strategy of the failure's category.
///
/// Categories are checked in a fixed order: server error, network error,
/// network timeout, rate limited. A failure matching none waits zero; the
/// retry condition normally rejects such failures before this is consulted.
#[derive(Debug, Clone)]
pub struct WaitContextAware {
    pub server_errors: SharedWait,
    pub network_errors: SharedWait,
    pub network_timeouts: SharedWait,
    pub rate_limited: SharedWait,
    pub server_error_codes: StatusCodeSet,
    pub network_error_classes: ErrorClassSet,
    pub network_timeout_classes: ErrorClassSet,
}

impl Default for WaitContextAware {
    fn default() -> Self {
        Self {
            server_errors: Arc::new(WaitExponentialJitter::default()),
            network_errors: Arc::new(WaitExponential::default()),
            network_timeouts: Arc::new(WaitExponentialJitter::default()),
            rate_limited: Arc::new(WaitFromHeader::retry_after()),
            server_error_codes: StatusCodeSet::default(),
            network_error_classes: ErrorClassSet::network_errors(),
            network_timeout_classes: ErrorClassSet::network_timeouts(),
        }
    }
}

impl WaitContextAware {
    /// First matching category in dispatch order.
    pub fn category(&self, attempt: &Attempt<'_>) -> Option<Category> {
        let outcome = &attempt.outcome;
        if is_server_error(outcome, &self.server_error_codes) {
            Some(Category::ServerError)
        } else if is_network_error(outcome, &self.network_error_classes) {
            Some(Category::NetworkError)
        } else if is_network_timeout(outcome, &self.network_timeout_classes) {
            Some(Category::NetworkTimeout)
        } else if is_rate_limited(outcome) {
            Some(Category::RateLimited)
        } else {
            None
        }
    }

    pub fn strategy(&self, category: Category) -> &SharedWait {
        match category {
            Category::ServerError => &self.server_errors,
            Category::NetworkError => &self.network_errors,
            Category::NetworkTimeout => &self.network_timeouts,
            Category::RateLimited => &self.rate_limited,
        }
    }
}

impl WaitStrategy for WaitContextAware {
    fn wait(&self, attempt: &Attempt<'_>) -> Duration {
        match self.category(attempt) {
            Some(category) => self.strategy(category).wait(attempt),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::error::{Headers, HttpError, TransportKind};

    fn fixed(secs: u64) -> SharedWait {
        Arc::new(WaitFixed(Duration::from_secs(secs)))
    }

    fn with_retry_after(status: u16, value: &str) -> HttpError {
        let headers: Headers = [("Retry-After", value)].into_iter().collect();
        HttpError::status_with_headers(status, headers)
    }

    #[test]
    fn exponential_grows_and_caps() {
        let w = WaitExponential::default();
        let e = HttpError::status(500);
        let secs: Vec<f64> = (1..=6)
            .map(|n| w.wait(&Attempt::failed(n, &e)).as_secs_f64())
            .collect();
        assert_eq!(secs, vec![1.0, 2.0, 4.0, 8.0, 15.0, 15.0]);
        assert_eq!(w.wait(&Attempt::failed(10_000, &e)), DEFAULT_MAX_WAIT);
    }

    #[test]
    fn exponential_respects_min() {
        let w = WaitExponential {
            multiplier: 0.1,
            min: Duration::from_secs(1),
            ..WaitExponential::default()
        };
        let e = HttpError::status(500);
        assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let w = WaitExponentialJitter::default();
        let e = HttpError::status(503);
        for _ in 0..100 {
            let d = w.wait(&Attempt::failed(2, &e));
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(3), "{d:?}");
            let capped = w.wait(&Attempt::failed(8, &e));
            assert_eq!(capped, DEFAULT_MAX_WAIT);
        }
    }

    #[test]
    fn header_value_wins_over_fallback() {
        let w = WaitFromHeader::new(RETRY_AFTER, fixed(9));
        let e = with_retry_after(429, "5");
        assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_secs(5));
        let e = with_retry_after(429, "0.5");
        assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_millis(500));
    }

    #[test]
    fn header_missing_or_bad_uses_fallback() {
        let w = WaitFromHeader::new(RETRY_AFTER, fixed(9));
        let nine = Duration::from_secs(9);
        let missing = HttpError::status(429);
        assert_eq!(w.wait(&Attempt::failed(1, &missing)), nine);
        for bad in ["not-a-number", "-3", "NaN", "inf", ""] {
            let e = with_retry_after(429, bad);
            assert_eq!(w.wait(&Attempt::failed(1, &e)), nine, "{bad}");
        }
        let transport = HttpError::transport(TransportKind::Read, "reset");
        assert_eq!(w.wait(&Attempt::failed(1, &transport)), nine);
    }

    #[test]
    fn header_http_date() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_445_412_480);
        // 21 Oct 2015 07:28:00 GMT is exactly `now`.
        let later = "Wed, 21 Oct 2015 07:28:30 GMT";
        assert_eq!(parse_wait_hint(later, now), Some(Duration::from_secs(30)));
        let earlier = "Wed, 21 Oct 2015 07:27:00 GMT";
        assert_eq!(parse_wait_hint(earlier, now), Some(Duration::ZERO));
    }

    #[test]
    fn custom_header_name() {
        let w = WaitFromHeader::new("X-RateLimit-Reset", fixed(1));
        let headers: Headers = [("x-ratelimit-reset", "12")].into_iter().collect();
        let e = HttpError::status_with_headers(429, headers);
        assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_secs(12));
    }

    fn dispatcher() -> WaitContextAware {
        WaitContextAware {
            server_errors: fixed(1),
            network_errors: fixed(2),
            network_timeouts: fixed(3),
            rate_limited: Arc::new(WaitFromHeader::new(RETRY_AFTER, fixed(4))),
            ..WaitContextAware::default()
        }
    }

    #[test]
    fn dispatches_by_category() {
        let w = dispatcher();
        let cases = [
            (HttpError::status(502), 1),
            (HttpError::transport(TransportKind::Connect, "refused"), 2),
            (HttpError::transport(TransportKind::ReadTimeout, "slow"), 3),
            (HttpError::status(429), 4),
            (with_retry_after(429, "6"), 6),
            (HttpError::status(404), 0),
            (HttpError::transport(TransportKind::Close, "eof"), 0),
        ];
        for (e, secs) in cases {
            assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_secs(secs), "{e}");
        }
        assert_eq!(w.wait(&Attempt::succeeded(1)), Duration::ZERO);
    }

    #[test]
    fn overlapping_sets_resolve_to_server_error() {
        let w = WaitContextAware {
            server_error_codes: StatusCodeSet::from([429u16, 503]),
            ..dispatcher()
        };
        let e = with_retry_after(429, "30");
        assert_eq!(w.category(&Attempt::failed(1, &e)), Some(Category::ServerError));
        assert_eq!(w.wait(&Attempt::failed(1, &e)), Duration::from_secs(1));
    }

    #[test]
    fn dispatch_is_repeatable() {
        let w = dispatcher();
        let e = with_retry_after(429, "2");
        let a = Attempt::failed(3, &e);
        assert_eq!(w.wait(&a), w.wait(&a));
    }
}
