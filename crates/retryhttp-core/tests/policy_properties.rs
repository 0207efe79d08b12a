//! Classification and wait selection through the public API, default configuration.

use retryhttp_core::retry::{
    is_network_error, is_network_timeout, is_rate_limited, is_server_error, run_with_policy_using,
    Attempt, AttemptOutcome, Category, ErrorClassSet, Headers, HttpError, RetryOptions,
    SharedWait, StatusCodeSet, TransportKind, WaitContextAware, WaitFixed, WaitStrategy,
};
use std::sync::Arc;
use std::time::Duration;

fn categories(e: &HttpError) -> Vec<Category> {
    let o = AttemptOutcome::Failure(e);
    let mut out = Vec::new();
    if is_rate_limited(&o) {
        out.push(Category::RateLimited);
    }
    if is_server_error(&o, &StatusCodeSet::default()) {
        out.push(Category::ServerError);
    }
    if is_network_error(&o, &ErrorClassSet::network_errors()) {
        out.push(Category::NetworkError);
    }
    if is_network_timeout(&o, &ErrorClassSet::network_timeouts()) {
        out.push(Category::NetworkTimeout);
    }
    out
}

#[test]
fn default_categories_are_mutually_exclusive() {
    for code in 100..600u16 {
        let e = HttpError::status(code);
        let found = categories(&e);
        assert!(found.len() <= 1, "{code}: {found:?}");
        match code {
            429 => assert_eq!(found, vec![Category::RateLimited]),
            500 | 502 | 503 | 504 => assert_eq!(found, vec![Category::ServerError]),
            _ => assert!(found.is_empty(), "{code}"),
        }
    }
    let kinds = [
        (TransportKind::Connect, Some(Category::NetworkError)),
        (TransportKind::Read, Some(Category::NetworkError)),
        (TransportKind::Write, Some(Category::NetworkError)),
        (TransportKind::Close, None),
        (TransportKind::ConnectTimeout, Some(Category::NetworkTimeout)),
        (TransportKind::ReadTimeout, Some(Category::NetworkTimeout)),
        (TransportKind::WriteTimeout, Some(Category::NetworkTimeout)),
        (TransportKind::PoolTimeout, Some(Category::NetworkTimeout)),
        (TransportKind::Protocol, None),
        (TransportKind::Other, None),
    ];
    for (kind, expected) in kinds {
        let e = HttpError::transport(kind, "x");
        assert_eq!(categories(&e), expected.into_iter().collect::<Vec<_>>(), "{kind:?}");
    }
}

#[test]
fn dispatcher_agrees_with_classifiers() {
    let w = WaitContextAware::default();
    let cases = [
        HttpError::status(429),
        HttpError::status(503),
        HttpError::transport(TransportKind::Read, "reset"),
        HttpError::transport(TransportKind::PoolTimeout, "busy"),
        HttpError::status(418),
    ];
    for e in &cases {
        let expected = categories(e).first().copied();
        assert_eq!(w.category(&Attempt::failed(1, e)), expected, "{e}");
    }
}

#[test]
fn header_hint_applies_only_to_rate_limits() {
    let zero: SharedWait = Arc::new(WaitFixed(Duration::ZERO));
    let policy = RetryOptions::default()
        .wait_server_errors(Arc::clone(&zero))
        .max_attempts(5)
        .build()
        .unwrap();
    let headers: Headers = [("Retry-After", "5")].into_iter().collect();
    let limited = HttpError::status_with_headers(429, headers.clone());
    let unavailable = HttpError::status_with_headers(503, headers);
    assert_eq!(
        policy.compute_wait(&Attempt::failed(1, &limited)),
        Duration::from_secs(5)
    );
    assert_eq!(
        policy.compute_wait(&Attempt::failed(1, &unavailable)),
        Duration::ZERO
    );
}

#[test]
fn default_waits_are_bounded() {
    let w = WaitContextAware::default();
    let failures = [
        HttpError::status(500),
        HttpError::status(429),
        HttpError::transport(TransportKind::Connect, "refused"),
        HttpError::transport(TransportKind::ReadTimeout, "slow"),
    ];
    for e in &failures {
        for n in 1..=20 {
            let d = w.wait(&Attempt::failed(n, e));
            assert!(d <= Duration::from_secs(15), "{e} attempt {n}: {d:?}");
        }
    }
}

#[test]
fn disabled_rate_limit_propagates_immediately() {
    let policy = RetryOptions::default()
        .retry_rate_limited(false)
        .build()
        .unwrap();
    let mut calls = 0;
    let mut slept = false;
    let result: Result<(), _> = run_with_policy_using(
        &policy,
        || {
            calls += 1;
            Err(HttpError::status(429))
        },
        |_| slept = true,
    );
    assert_eq!(result.unwrap_err().status_code(), Some(429));
    assert_eq!(calls, 1);
    assert!(!slept);
}
