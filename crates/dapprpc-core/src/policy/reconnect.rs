//! Exponential backoff for reconnect attempts after a `close`.

use std::time::Duration;

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Re-issue a connect attempt after every `close`.
    pub enabled: bool,
    /// Maximum consecutive attempts without a successful `connect`
    /// (`None` = keep trying).
    pub max_attempts: Option<u32>,
    /// Delay before the first attempt.
    pub initial_backoff: Duration,
    /// Maximum delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to the delay on each consecutive attempt.
    pub multiplier: f64,
    /// Fixed extra delay of `padding_fraction * delay / 2` added to every
    /// attempt (0.0 = none). Deterministic: it does not randomize.
    pub padding_fraction: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: None,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            padding_fraction: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Surface `close` and never reconnect on our own.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Stateless policy: computes the delay before the `attempt`-th reconnect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub config: ReconnectConfig,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config }
    }

    /// Delay before the `attempt`-th consecutive attempt (1-based), or `None`
    /// when reconnecting is disabled or the attempt budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        let capped = base_ms.min(cap_ms);

        let padding_ms = capped * self.config.padding_fraction * 0.5;
        Some(Duration::from_millis((capped + padding_ms) as u64))
    }

    /// Returns `true` if the `attempt`-th consecutive attempt is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.config.enabled && attempt >= 1 && self.config.max_attempts.map_or(true, |max| attempt <= max)
    }
}
