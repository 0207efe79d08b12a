use crate::http::RequestOptions;
use crate::retry::{
    ErrorClass, RetryOptions, SharedWait, WaitExponential, WaitExponentialJitter, WaitFixed,
    WaitFromHeader, DEFAULT_MAX_ATTEMPTS, DEFAULT_NETWORK_ERRORS, DEFAULT_NETWORK_TIMEOUTS,
    DEFAULT_SERVER_ERROR_CODES, RETRY_AFTER,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn secs(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{field} must be a non-negative number of seconds, got {value}"))
}

fn default_exp_base() -> f64 {
    2.0
}

/// Wait strategy as written in config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WaitConfig {
    Fixed {
        secs: f64,
    },
    Exponential {
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default = "default_exp_base")]
        exp_base: f64,
        #[serde(default)]
        min_secs: f64,
        max_secs: f64,
    },
    ExponentialJitter {
        #[serde(default = "default_initial")]
        initial_secs: f64,
        #[serde(default = "default_exp_base")]
        exp_base: f64,
        #[serde(default = "default_jitter")]
        jitter_secs: f64,
        max_secs: f64,
    },
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_initial() -> f64 {
    1.0
}

fn default_jitter() -> f64 {
    1.0
}

impl WaitConfig {
    /// Plain exponential backoff, multiplier 1, capped at 15s.
    pub fn exponential() -> Self {
        WaitConfig::Exponential {
            multiplier: 1.0,
            exp_base: 2.0,
            min_secs: 0.0,
            max_secs: 15.0,
        }
    }

    /// Jittered exponential backoff, initial 1s, capped at 15s.
    pub fn exponential_jitter() -> Self {
        WaitConfig::ExponentialJitter {
            initial_secs: 1.0,
            exp_base: 2.0,
            jitter_secs: 1.0,
            max_secs: 15.0,
        }
    }

    pub fn to_wait(&self) -> Result<SharedWait> {
        let wait: SharedWait = match *self {
            WaitConfig::Fixed { secs: s } => Arc::new(WaitFixed(secs(s, "secs")?)),
            WaitConfig::Exponential {
                multiplier,
                exp_base,
                min_secs,
                max_secs,
            } => Arc::new(WaitExponential {
                multiplier,
                exp_base,
                min: secs(min_secs, "min_secs")?,
                max: secs(max_secs, "max_secs")?,
            }),
            WaitConfig::ExponentialJitter {
                initial_secs,
                exp_base,
                jitter_secs,
                max_secs,
            } => Arc::new(WaitExponentialJitter {
                initial: secs(initial_secs, "initial_secs")?,
                exp_base,
                jitter: secs(jitter_secs, "jitter_secs")?,
                max: secs(max_secs, "max_secs")?,
            }),
        };
        Ok(wait)
    }
}

/// Retry policy parameters (`[retry]` in config.toml). Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub retry_server_errors: bool,
    pub retry_network_errors: bool,
    pub retry_network_timeouts: bool,
    pub retry_rate_limited: bool,
    /// Status codes treated as retryable server errors.
    pub server_error_codes: Vec<u16>,
    /// e.g. `["connect", "read", "write"]`.
    pub network_errors: Vec<ErrorClass>,
    pub network_timeouts: Vec<ErrorClass>,
    /// Header holding the server's wait hint on 429 responses.
    pub rate_limit_header: String,
    pub wait_server_errors: WaitConfig,
    pub wait_network_errors: WaitConfig,
    pub wait_network_timeouts: WaitConfig,
    /// Used when the rate-limit header is missing or unparsable.
    pub wait_rate_limited_fallback: WaitConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_server_errors: true,
            retry_network_errors: true,
            retry_network_timeouts: true,
            retry_rate_limited: true,
            server_error_codes: DEFAULT_SERVER_ERROR_CODES.to_vec(),
            network_errors: DEFAULT_NETWORK_ERRORS.to_vec(),
            network_timeouts: DEFAULT_NETWORK_TIMEOUTS.to_vec(),
            rate_limit_header: RETRY_AFTER.to_string(),
            wait_server_errors: WaitConfig::exponential_jitter(),
            wait_network_errors: WaitConfig::exponential(),
            wait_network_timeouts: WaitConfig::exponential_jitter(),
            wait_rate_limited_fallback: WaitConfig::exponential_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn to_options(&self) -> Result<RetryOptions> {
        if self.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        let rate_limited = WaitFromHeader::new(
            self.rate_limit_header.clone(),
            self.wait_rate_limited_fallback
                .to_wait()
                .context("retry.wait_rate_limited_fallback")?,
        );
        Ok(RetryOptions::default()
            .max_attempts(self.max_attempts)
            .retry_server_errors(self.retry_server_errors)
            .retry_network_errors(self.retry_network_errors)
            .retry_network_timeouts(self.retry_network_timeouts)
            .retry_rate_limited(self.retry_rate_limited)
            .server_error_codes(self.server_error_codes.clone())
            .network_errors(self.network_errors.clone())
            .network_timeouts(self.network_timeouts.clone())
            .wait_server_errors(
                self.wait_server_errors
                    .to_wait()
                    .context("retry.wait_server_errors")?,
            )
            .wait_network_errors(
                self.wait_network_errors
                    .to_wait()
                    .context("retry.wait_network_errors")?,
            )
            .wait_network_timeouts(
                self.wait_network_timeouts
                    .to_wait()
                    .context("retry.wait_network_timeouts")?,
            )
            .wait_rate_limited(Arc::new(rate_limited)))
    }
}

/// Transport settings (`[request]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub follow_redirects: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 30,
            follow_redirects: true,
        }
    }
}

impl RequestConfig {
    pub fn to_options(&self) -> RequestOptions {
        RequestOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            follow_redirects: self.follow_redirects,
            ..RequestOptions::default()
        }
    }
}

/// Global configuration loaded from `~/.config/retryhttp/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub request: RequestConfig,
    pub retry: RetryConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryhttp")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}
