//! Retry loop: run a closure until success or the policy says stop.

use super::attempt::Attempt;
use super::error::HttpError;
use super::policy::{RetryDecision, RetryPolicy};
use std::future::Future;
use std::time::{Duration, Instant};

/// What the loop should do after a failed attempt.
enum Step {
    GiveUp,
    Sleep(Duration),
}

fn next_step(policy: &RetryPolicy, number: u32, started: Instant, error: &HttpError) -> Step {
    let attempt = Attempt::failed(number, error).with_elapsed(started.elapsed());
    match policy.decide(&attempt) {
        RetryDecision::NoRetry => {
            tracing::debug!(attempt = number, error = %error, "not retryable");
            Step::GiveUp
        }
        RetryDecision::Exhausted => {
            tracing::warn!(attempt = number, error = %error, "giving up after {} attempts", number);
            Step::GiveUp
        }
        RetryDecision::RetryAfter(delay) => {
            tracing::debug!(
                attempt = number,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "retrying"
            );
            Step::Sleep(delay)
        }
    }
}

/// Runs `f` until it succeeds or the policy says to stop, pausing with
/// `std::thread::sleep` between attempts.
///
/// The error returned is the last attempt's own failure.
pub fn run_with_policy<T, F>(policy: &RetryPolicy, f: F) -> Result<T, HttpError>
where
    F: FnMut() -> Result<T, HttpError>,
{
    run_with_policy_using(policy, f, std::thread::sleep)
}

/// Like [`run_with_policy`] but the caller supplies the pause.
pub fn run_with_policy_using<T, F, S>(
    policy: &RetryPolicy,
    mut f: F,
    mut sleep: S,
) -> Result<T, HttpError>
where
    F: FnMut() -> Result<T, HttpError>,
    S: FnMut(Duration),
{
    let started = Instant::now();
    let mut number = 1u32;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) => match next_step(policy, number, started, &e) {
                Step::GiveUp => return Err(e),
                Step::Sleep(d) => {
                    sleep(d);
                    number = number.saturating_add(1);
                }
            },
        }
    }
}

/// Async variant; pauses with `tokio::time::sleep`.
pub async fn run_with_policy_async<T, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let started = Instant::now();
    let mut number = 1u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => match next_step(policy, number, started, &e) {
                Step::GiveUp => return Err(e),
                Step::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    number = number.saturating_add(1);
                }
            },
        }
    }
}
