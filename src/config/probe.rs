//! The immutable run configuration.

use super::settings::{Settings, MAX_CONCURRENCY};
use crate::error::{ProbeError, ProbeResult};
use crate::types::PortStrategy;
use std::time::Duration;

/// Configuration for one run, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Number of workers, and capacity of the work and result queues.
    pub concurrency: usize,
    /// Deadline for resolution and, separately, for correlation.
    pub timeout: Duration,
    /// Interface the captures are bound to.
    pub interface: String,
    /// How often capture polling returns to check the deadline.
    pub poll_interval: Duration,
    /// Capture snapshot length in bytes.
    pub snaplen: u32,
    /// Source port selection strategy.
    pub port_strategy: PortStrategy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from_valid_settings(&Settings::default())
    }
}

impl ProbeConfig {
    fn from_valid_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.concurrency,
            timeout: Duration::from_millis(settings.timeout_ms),
            interface: settings.interface.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            snaplen: settings.snaplen,
            port_strategy: settings.port_strategy,
        }
    }

    /// Set the number of workers.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the capture poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Set the source port strategy.
    pub fn with_port_strategy(mut self, strategy: PortStrategy) -> Self {
        self.port_strategy = strategy;
        self
    }

    /// Check every value is usable.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.concurrency == 0 {
            return Err(ProbeError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ProbeError::InvalidConfig(format!(
                "concurrency {} exceeds the maximum of {}",
                self.concurrency, MAX_CONCURRENCY
            )));
        }
        if self.timeout.is_zero() {
            return Err(ProbeError::InvalidConfig(
                "timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ProbeError::InvalidConfig(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        if self.interface.trim().is_empty() {
            return Err(ProbeError::InvalidConfig(
                "interface name cannot be empty".to_string(),
            ));
        }
        if self.snaplen < 64 {
            return Err(ProbeError::InvalidConfig(format!(
                "snaplen {} is too small to hold IP and TCP headers (minimum 64)",
                self.snaplen
            )));
        }
        Ok(())
    }
}

impl TryFrom<Settings> for ProbeConfig {
    type Error = ProbeError;

    fn try_from(settings: Settings) -> ProbeResult<Self> {
        let config = Self::from_valid_settings(&settings);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_contract() {
        let config = ProbeConfig::default();
        assert_eq!(config.concurrency, 100);
        assert_eq!(config.timeout, Duration::from_millis(300));
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let zero_workers = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        assert!(matches!(
            ProbeConfig::try_from(zero_workers),
            Err(ProbeError::InvalidConfig(_))
        ));

        let zero_timeout = Settings {
            timeout_ms: 0,
            ..Settings::default()
        };
        assert!(ProbeConfig::try_from(zero_timeout).is_err());

        let zero_poll = ProbeConfig::default().with_poll_interval(Duration::ZERO);
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn test_huge_concurrency_is_rejected() {
        let huge = ProbeConfig::default().with_concurrency(usize::MAX / 4);
        assert!(matches!(huge.validate(), Err(ProbeError::InvalidConfig(_))));

        let at_limit = ProbeConfig::default().with_concurrency(MAX_CONCURRENCY);
        assert!(at_limit.validate().is_ok());
        assert!(at_limit.with_concurrency(MAX_CONCURRENCY + 1).validate().is_err());
    }

    #[test]
    fn test_blank_interface_and_tiny_snaplen() {
        assert!(ProbeConfig::default().with_interface("  ").validate().is_err());

        let tiny = Settings {
            snaplen: 20,
            ..Settings::default()
        };
        assert!(ProbeConfig::try_from(tiny).is_err());
    }

    #[test]
    fn test_builders() {
        let config = ProbeConfig::default()
            .with_concurrency(4)
            .with_timeout(Duration::from_millis(50))
            .with_interface("ens5")
            .with_port_strategy(PortStrategy::Sequential);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.interface, "ens5");
        assert_eq!(config.port_strategy, PortStrategy::Sequential);
    }
}
