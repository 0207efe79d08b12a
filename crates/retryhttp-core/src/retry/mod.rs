//! Retry policy for transient HTTP failures.
//!
//! Failures are classified into four categories (rate limited, server error,
//! network error, network timeout). Each category can be switched off and has
//! its own wait strategy; rate-limited responses honor the server's
//! `Retry-After` hint. [`RetryOptions::build`] composes the pieces into a
//! [`RetryPolicy`] and the `run_with_policy*` functions drive the attempts.

mod attempt;
mod classify;
mod error;
mod policy;
mod run;
mod wait;

pub use attempt::{Attempt, AttemptOutcome};
pub use classify::{
    is_network_error, is_network_timeout, is_rate_limited, is_server_error, Category, ErrorClass,
    ErrorClassSet, RetryCondition, RetryFn, StatusCodeSet, DEFAULT_NETWORK_ERRORS,
    DEFAULT_NETWORK_TIMEOUTS, DEFAULT_SERVER_ERROR_CODES, TOO_MANY_REQUESTS,
};
pub use error::{transport_kind_of, Headers, HttpError, TransportKind};
pub use policy::{
    PolicyError, RetryDecision, RetryOptions, RetryPolicy, StopCondition, DEFAULT_MAX_ATTEMPTS,
};
pub use run::{run_with_policy, run_with_policy_async, run_with_policy_using};
pub use wait::{
    parse_wait_hint, SharedWait, WaitContextAware, WaitExponential, WaitExponentialJitter,
    WaitFixed, WaitFromHeader, WaitStrategy, DEFAULT_MAX_WAIT, RETRY_AFTER,
};
