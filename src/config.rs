use crate::error::{EngineError, Result};

/// Engine configuration with environment-variable overrides.
///
/// Defaults match the production design targets: a 30-minute auto-book
/// sweep, an hourly status poll, and a 7-day booking lead window.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deployment environment (development, test, production).
    pub environment: String,
    /// Marketplace API base URL.
    pub marketplace_base_url: String,
    /// Marketplace API key (bearer token).
    pub marketplace_api_key: String,
    /// Per-call marketplace timeout in seconds.
    pub marketplace_timeout_secs: u64,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// How far ahead the auto-book sweep will book, in days.
    pub booking_lead_days: i64,
    /// Interval between auto-book sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// Interval between status-poll sweeps, in seconds.
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            marketplace_base_url: "https://api.rentahuman.ai".to_string(),
            marketplace_api_key: String::new(),
            marketplace_timeout_secs: 30,
            webhook_secret: String::new(),
            booking_lead_days: 7,
            sweep_interval_secs: 1800,
            poll_interval_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// Build a config from `TURNOVER_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(env) = std::env::var("TURNOVER_ENV") {
            config.environment = env;
        }

        if let Ok(url) = std::env::var("TURNOVER_MARKETPLACE_URL") {
            config.marketplace_base_url = url;
        }

        if let Ok(key) = std::env::var("TURNOVER_MARKETPLACE_API_KEY") {
            config.marketplace_api_key = key;
        }

        if let Ok(timeout) = std::env::var("TURNOVER_MARKETPLACE_TIMEOUT_SECS") {
            config.marketplace_timeout_secs = timeout.parse().map_err(|e| {
                EngineError::Configuration(format!("Invalid marketplace_timeout_secs: {e}"))
            })?;
        }

        if let Ok(secret) = std::env::var("TURNOVER_WEBHOOK_SECRET") {
            config.webhook_secret = secret;
        }

        if let Ok(days) = std::env::var("TURNOVER_BOOKING_LEAD_DAYS") {
            config.booking_lead_days = days.parse().map_err(|e| {
                EngineError::Configuration(format!("Invalid booking_lead_days: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TURNOVER_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = interval.parse().map_err(|e| {
                EngineError::Configuration(format!("Invalid sweep_interval_secs: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("TURNOVER_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = interval.parse().map_err(|e| {
                EngineError::Configuration(format!("Invalid poll_interval_secs: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Webhook signature checks are skipped in development mode.
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.booking_lead_days, 7);
        assert_eq!(config.sweep_interval_secs, 1800);
        assert_eq!(config.poll_interval_secs, 3600);
        assert!(config.is_development());
    }

    #[test]
    fn test_env_overrides() {
        let _env = crate::test_support::env_lock();
        std::env::set_var("TURNOVER_BOOKING_LEAD_DAYS", "3");
        std::env::set_var("TURNOVER_ENV", "production");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.booking_lead_days, 3);
        assert!(!config.is_development());

        std::env::remove_var("TURNOVER_BOOKING_LEAD_DAYS");
        std::env::remove_var("TURNOVER_ENV");
    }

    #[test]
    fn test_invalid_env_value() {
        let _env = crate::test_support::env_lock();
        std::env::set_var("TURNOVER_SWEEP_INTERVAL_SECS", "not-a-number");
        let result = EngineConfig::from_env();
        assert!(result.is_err());
        std::env::remove_var("TURNOVER_SWEEP_INTERVAL_SECS");
    }
}
