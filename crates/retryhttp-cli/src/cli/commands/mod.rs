//! CLI command handlers, one per file.

mod config;
mod get;
mod wait_preview;

pub use config::run_config;
pub use get::run_get;
pub use wait_preview::run_wait_preview;

#[cfg(test)]
pub(crate) use wait_preview::preview as preview_rows;
