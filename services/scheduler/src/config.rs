use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub pass_interval: Duration,
    pub log_level: String,
    /// Kill tasks whose goal override changed so they relaunch under it.
    pub kill_on_pause: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "keel".to_string(),
            pass_interval: Duration::from_millis(1000),
            log_level: "info".to_string(),
            kill_on_pause: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let service_name = lookup("KEEL_SERVICE_NAME").unwrap_or(defaults.service_name);

        let pass_interval = match lookup("KEEL_PASS_INTERVAL_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .with_context(|| format!("invalid KEEL_PASS_INTERVAL_MS: {ms}"))?,
            ),
            None => defaults.pass_interval,
        };
        if pass_interval.is_zero() {
            anyhow::bail!("KEEL_PASS_INTERVAL_MS must be greater than zero");
        }

        let log_level = lookup("KEEL_LOG_LEVEL").unwrap_or(defaults.log_level);

        let kill_on_pause = lookup("KEEL_KILL_ON_PAUSE")
            .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
            .unwrap_or(defaults.kill_on_pause);

        Ok(Self {
            service_name,
            pass_interval,
            log_level,
            kill_on_pause,
        })
    }
}
