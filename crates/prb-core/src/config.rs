#![forbid(unsafe_code)]

//! Engine tuning knobs.

use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of the full refresh pass (dashboard only).
    /// Default: 10s.
    pub refresh_interval: Duration,

    /// Quiet period a row must observe after its last internal mutation
    /// before it is resynced.
    /// Default: 250ms.
    pub debounce_delay: Duration,

    /// Label of the header cell added to every container.
    /// Default: "Blockers".
    pub header_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(10),
            debounce_delay: Duration::from_millis(250),
            header_label: "Blockers".to_string(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    #[must_use]
    pub fn with_header_label(mut self, label: impl Into<String>) -> Self {
        self.header_label = label.into();
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "refresh_interval",
                value: self.refresh_interval,
            });
        }
        if self.debounce_delay.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "debounce_delay",
                value: self.debounce_delay,
            });
        }
        if self.header_label.trim().is_empty() {
            return Err(ConfigError::EmptyHeaderLabel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(10));
        assert_eq!(config.header_label, "Blockers");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let config = EngineConfig::default().with_refresh_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration {
                field: "refresh_interval",
                ..
            })
        ));
    }

    #[test]
    fn blank_header_label_is_rejected() {
        let config = EngineConfig::default().with_header_label("   ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyHeaderLabel));
    }
}
