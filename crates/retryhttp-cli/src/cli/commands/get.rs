//! Get command: fetch a URL under the configured retry policy.

use anyhow::{Context, Result};
use retryhttp_core::config::AppConfig;
use retryhttp_core::http;
use std::io::Write;

/// Fetch `url` and write the body to stdout. The final failure becomes the error.
pub fn run_get(cfg: &AppConfig, url: &str) -> Result<()> {
    let policy = cfg
        .retry
        .to_options()
        .context("invalid [retry] config")?
        .build()?;
    let opts = cfg.request.to_options();

    let resp = http::get_with_retry(url, &opts, &policy)
        .with_context(|| format!("GET {} failed", url))?;
    tracing::info!(url, status = resp.status, bytes = resp.body.len(), "fetched");

    eprintln!("HTTP {}", resp.status);
    let mut out = std::io::stdout().lock();
    out.write_all(&resp.body)?;
    out.flush()?;
    Ok(())
}
