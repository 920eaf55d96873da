//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; embedders that do not install their own
//! subscriber can call [`init_tracing`] once at startup.

use anyhow::{Context, Result};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::config::{Config, LogFormat};

/// Install a global subscriber with an env-filter and the configured output format.
///
/// Fails (instead of panicking) when a global subscriber is already set.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter))?;

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to install tracing subscriber")?,
    }

    tracing::debug!(filter = %config.log_filter, "Tracing initialized");
    Ok(())
}
