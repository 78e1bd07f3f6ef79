// escalation-engine-rs/src/config.rs
//
// Engine configuration from environment variables with typed fallbacks.

use std::time::Duration;

use tracing::warn;

/// Scheduling and detection parameters for the engine loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sleep between successful cycles.
    pub check_interval: Duration,
    /// Shortened sleep after a failed cycle.
    pub retry_delay: Duration,
    /// Lookback window for pattern detection.
    pub detection_window: chrono::Duration,
    /// Wall-clock hour (UTC) of the daily summary window.
    pub summary_hour: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            retry_delay: Duration::from_secs(60),
            detection_window: chrono::Duration::hours(24),
            summary_hour: 9,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            check_interval: Duration::from_secs(env_parse(
                "CHECK_INTERVAL_SECS",
                defaults.check_interval.as_secs(),
            )),
            retry_delay: Duration::from_secs(env_parse(
                "RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )),
            detection_window: chrono::Duration::hours(env_parse(
                "DETECTION_WINDOW_HOURS",
                defaults.detection_window.num_hours(),
            )),
            summary_hour: env_parse("SUMMARY_HOUR", defaults.summary_hour),
        }
    }
}
