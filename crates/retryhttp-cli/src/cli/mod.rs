//! CLI for retryhttp.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use retryhttp_core::config::{self, AppConfig};
use std::path::PathBuf;

use commands::{run_config, run_get, run_wait_preview};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "retryhttp")]
#[command(about = "Fetch URLs, retrying transient HTTP failures", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/retryhttp/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Per-invocation overrides of the `[retry]` and `[request]` config sections.
#[derive(Debug, Clone, Default, Args)]
pub struct RetryFlags {
    /// Maximum attempts including the first.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
    /// Do not retry 5xx responses.
    #[arg(long)]
    pub no_server_errors: bool,
    /// Do not retry connect/read/write failures.
    #[arg(long)]
    pub no_network_errors: bool,
    /// Do not retry timeouts.
    #[arg(long)]
    pub no_timeouts: bool,
    /// Do not retry 429 responses.
    #[arg(long)]
    pub no_rate_limit: bool,
    /// Connect timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,
    /// Whole-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl RetryFlags {
    /// Apply flags on top of the loaded configuration.
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(n) = self.max_attempts {
            cfg.retry.max_attempts = n;
        }
        if self.no_server_errors {
            cfg.retry.retry_server_errors = false;
        }
        if self.no_network_errors {
            cfg.retry.retry_network_errors = false;
        }
        if self.no_timeouts {
            cfg.retry.retry_network_timeouts = false;
        }
        if self.no_rate_limit {
            cfg.retry.retry_rate_limited = false;
        }
        if let Some(secs) = self.connect_timeout {
            cfg.request.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.timeout {
            cfg.request.timeout_secs = secs;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// GET a URL, retrying transient failures, and print the body.
    Get {
        /// HTTP/HTTPS URL to fetch.
        url: String,
        #[command(flatten)]
        flags: RetryFlags,
    },

    /// Print the effective configuration as TOML.
    Config,

    /// Show the delay each failure category would get for the first N attempts.
    WaitPreview {
        /// Number of attempts to show.
        #[arg(long, default_value = "5", value_name = "N")]
        attempts: u32,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get { url, flags } => {
                let mut cfg = cfg;
                flags.apply(&mut cfg);
                run_get(&cfg, &url)?;
            }
            CliCommand::Config => run_config(&cfg)?,
            CliCommand::WaitPreview { attempts } => run_wait_preview(&cfg, attempts)?,
        }

        Ok(())
    }
}
