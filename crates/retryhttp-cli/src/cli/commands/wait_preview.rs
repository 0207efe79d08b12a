//! Wait-preview command: show per-category delays for the configured waits.

use anyhow::{Context, Result};
use retryhttp_core::config::AppConfig;
use retryhttp_core::retry::{Attempt, HttpError, StopCondition, TransportKind};

/// One representative failure per category.
pub(crate) fn sample_failures() -> Vec<(&'static str, HttpError)> {
    vec![
        ("server error (503)", HttpError::status(503)),
        (
            "network error (connect)",
            HttpError::transport(TransportKind::Connect, "connection refused"),
        ),
        (
            "network timeout (read)",
            HttpError::transport(TransportKind::ReadTimeout, "operation timed out"),
        ),
        ("rate limited (429, no hint)", HttpError::status(429)),
    ]
}

/// Delays in seconds for attempts `1..=attempts`; `None` where the policy would not retry.
pub(crate) fn preview(cfg: &AppConfig, attempts: u32) -> Result<Vec<(&'static str, Vec<Option<f64>>)>> {
    let policy = cfg
        .retry
        .to_options()
        .context("invalid [retry] config")?
        // Preview every requested attempt regardless of max_attempts.
        .stop_override(StopCondition::Never)
        .build()?;
    let rows = sample_failures()
        .into_iter()
        .map(|(label, e)| {
            let delays = (1..=attempts)
                .map(|n| {
                    let a = Attempt::failed(n, &e);
                    policy
                        .should_retry(&a)
                        .then(|| policy.compute_wait(&a).as_secs_f64())
                })
                .collect();
            (label, delays)
        })
        .collect();
    Ok(rows)
}

pub fn run_wait_preview(cfg: &AppConfig, attempts: u32) -> Result<()> {
    for (label, delays) in preview(cfg, attempts)? {
        let cells: Vec<String> = delays
            .iter()
            .map(|d| match d {
                Some(secs) => format!("{:>6.2}s", secs),
                None => format!("{:>7}", "-"),
            })
            .collect();
        println!("{:<28} {}", label, cells.join(" "));
    }
    Ok(())
}
