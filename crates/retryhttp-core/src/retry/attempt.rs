//! Per-attempt state handed to retry conditions, wait strategies and stop conditions.

use super::error::HttpError;
use std::time::Duration;

/// Result of one attempt, as seen by the policy. Never mutated by it.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    Success,
    Failure(&'a HttpError),
}

impl<'a> AttemptOutcome<'a> {
    pub fn failure(&self) -> Option<&'a HttpError> {
        match *self {
            AttemptOutcome::Success => None,
            AttemptOutcome::Failure(e) => Some(e),
        }
    }
}

/// Snapshot of the attempt that just finished.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    /// 1-based (1 = first attempt).
    pub number: u32,
    /// Time since the first attempt started.
    pub elapsed: Duration,
    pub outcome: AttemptOutcome<'a>,
}

impl<'a> Attempt<'a> {
    pub fn failed(number: u32, error: &'a HttpError) -> Self {
        Self {
            number,
            elapsed: Duration::ZERO,
            outcome: AttemptOutcome::Failure(error),
        }
    }

    pub fn succeeded(number: u32) -> Self {
        Self {
            number,
            elapsed: Duration::ZERO,
            outcome: AttemptOutcome::Success,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn failure(&self) -> Option<&'a HttpError> {
        self.outcome.failure()
    }
}
