//! Tracing setup.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the global JSON subscriber.
///
/// `RUST_LOG` takes precedence; the configured log level is the fallback.
/// Fails if a global subscriber is already set.
pub fn init(config: &Config) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()?;
    Ok(())
}
