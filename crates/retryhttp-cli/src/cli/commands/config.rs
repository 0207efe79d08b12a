//! Config command: print the effective configuration.

use anyhow::Result;
use retryhttp_core::config::AppConfig;

pub fn run_config(cfg: &AppConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
