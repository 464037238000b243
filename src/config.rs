//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::coach;
use crate::market::coingecko;

/// Runtime configuration for the Karion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the persisted signal files
    pub data_dir: PathBuf,

    /// Random-walk market tick period in seconds
    pub market_tick_secs: u64,

    /// News and coach pulse period in seconds
    pub pulse_secs: u64,

    /// Crypto quote refresh period in seconds (also the cache TTL)
    pub crypto_secs: u64,

    /// Risk score refresh period in seconds
    pub risk_secs: u64,

    /// CoinGecko REST base URL
    pub coingecko_url: String,

    /// Disable the outbound crypto feed (offline mode)
    pub crypto_enabled: bool,

    /// OpenAI key; the rule-based coach answers when absent
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Chat completion model
    pub openai_model: String,

    /// OpenAI-compatible REST base URL
    pub openai_url: String,

    /// Default Monte Carlo run count when a request omits it
    pub simulations: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            market_tick_secs: 3,
            pulse_secs: 15,
            crypto_secs: 60,
            risk_secs: 120,
            coingecko_url: coingecko::DEFAULT_BASE_URL.to_string(),
            crypto_enabled: true,
            openai_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_url: coach::DEFAULT_OPENAI_URL.to_string(),
            simulations: 1000,
        }
    }
}

impl ServiceConfig {
    pub fn market_tick(&self) -> Duration {
        Duration::from_secs(self.market_tick_secs.max(1))
    }

    pub fn pulse_interval(&self) -> Duration {
        Duration::from_secs(self.pulse_secs.max(1))
    }

    pub fn crypto_interval(&self) -> Duration {
        Duration::from_secs(self.crypto_secs.max(1))
    }

    pub fn risk_interval(&self) -> Duration {
        Duration::from_secs(self.risk_secs.max(1))
    }

    /// Whether a non-empty OpenAI key is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = ServiceConfig::default();
        assert_eq!(config.market_tick(), Duration::from_secs(3));
        assert_eq!(config.pulse_interval(), Duration::from_secs(15));
        assert_eq!(config.crypto_interval(), Duration::from_secs(60));
        assert_eq!(config.risk_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_zero_interval_is_floored() {
        let config = ServiceConfig {
            market_tick_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.market_tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_blank_openai_key() {
        let mut config = ServiceConfig::default();
        assert!(!config.has_openai());
        config.openai_api_key = Some("  ".to_string());
        assert!(!config.has_openai());
        config.openai_api_key = Some("sk-test".to_string());
        assert!(config.has_openai());
    }
}
