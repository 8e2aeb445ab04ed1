//! Reconciliation sweep configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Reconciliation sweep configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Seconds between scheduled sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Subscription rows fetched per page during a sweep
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hours an enrollment may sit pending before it is written off
    #[serde(default = "default_pending_ttl_hours")]
    pub pending_ttl_hours: i64,
}

impl ReconciliationConfig {
    /// Pending TTL as a chrono duration
    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.pending_ttl_hours)
    }

    /// Sweep interval as a std duration
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Validate reconciliation configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page_size == 0 || self.page_size > 10_000 {
            return Err(ValidationError::InvalidSweepPageSize);
        }
        if self.pending_ttl_hours < 1 {
            return Err(ValidationError::InvalidPendingTtl);
        }
        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
            pending_ttl_hours: default_pending_ttl_hours(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_page_size() -> u32 {
    500
}

fn default_pending_ttl_hours() -> i64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sweep_hourly_with_day_long_ttl() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.page_size, 500);
        assert_eq!(config.pending_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn validation_rejects_zero_page_size() {
        let config = ReconciliationConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_oversized_page() {
        let config = ReconciliationConfig {
            page_size: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_sub_hour_ttl() {
        let config = ReconciliationConfig {
            pending_ttl_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_accepts_defaults() {
        assert!(ReconciliationConfig::default().validate().is_ok());
    }
}
