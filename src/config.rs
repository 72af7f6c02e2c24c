//! Configuration management for the bridge core
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bridge: BridgeConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
    #[serde(default)]
    pub sdk: SandboxConfig,
}

/// Form, validation and orchestration tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Symbol of the gas token; subject to the gas reserve
    pub native_token: String,
    pub supported_tokens: Vec<String>,
    /// Amount of native token kept back for fees
    pub gas_reserve: f64,
    /// Amounts below this trigger a dust warning
    pub dust_threshold: f64,
    pub simulation_debounce_ms: u64,
    /// Delay before a completed progress list is cleared
    pub progress_reset_delay_ms: u64,
    /// Lifetime of non-loading status lines
    pub notice_ttl_ms: u64,
    pub max_notices: usize,
    pub default_chain_id: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            native_token: "ETH".to_string(),
            supported_tokens: vec!["ETH".to_string(), "USDC".to_string(), "USDT".to_string()],
            gas_reserve: 0.01,
            dust_threshold: 0.000001,
            simulation_debounce_ms: 500,
            progress_reset_delay_ms: 2000,
            notice_ttl_ms: 5000,
            max_notices: 50,
            default_chain_id: 1,
        }
    }
}

impl BridgeConfig {
    pub fn simulation_debounce(&self) -> Duration {
        Duration::from_millis(self.simulation_debounce_ms)
    }

    pub fn progress_reset_delay(&self) -> Duration {
        Duration::from_millis(self.progress_reset_delay_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    pub fn is_supported_token(&self, symbol: &str) -> bool {
        self.supported_tokens.iter().any(|t| t == symbol)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub enabled: bool,
}

/// Script for the in-process sandbox SDK
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub step_delay_ms: u64,
    pub require_allowance: bool,
    pub require_intent: bool,
    /// Protocol fee in basis points of the bridged amount
    pub fee_bps: u32,
    /// Make every bridge and transfer fail with this message
    pub fail_with: Option<String>,
    pub explorer_base_url: String,
    pub balances: Vec<SeedBalance>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 250,
            require_allowance: true,
            require_intent: true,
            fee_bps: 10,
            fail_with: None,
            explorer_base_url: "https://explorer.nexus.availproject.org/intent".to_string(),
            balances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBalance {
    pub symbol: String,
    pub fiat_price: f64,
    pub chains: Vec<SeedChainBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedChainBalance {
    pub chain_id: u64,
    pub balance: f64,
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("PAYGATE_BRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(raw: &str) -> Result<Self> {
        let config_str = substitute_env_vars(raw);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        let bridge = &self.bridge;
        if !self.is_supported_chain(bridge.default_chain_id) {
            anyhow::bail!(
                "Default chain {} is not an enabled chain",
                bridge.default_chain_id
            );
        }
        if !bridge.is_supported_token(&bridge.native_token) {
            anyhow::bail!(
                "Native token {} is not in supported_tokens",
                bridge.native_token
            );
        }
        if bridge.gas_reserve < 0.0 || bridge.dust_threshold < 0.0 {
            anyhow::bail!("gas_reserve and dust_threshold must not be negative");
        }
        if bridge.simulation_debounce_ms == 0 {
            anyhow::bail!("simulation_debounce_ms must be positive");
        }

        for seed in &self.sdk.balances {
            if !bridge.is_supported_token(&seed.symbol) {
                tracing::warn!("Sandbox balance for unsupported token {} - ignored", seed.symbol);
            }
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }

    pub fn is_supported_chain(&self, chain_id: u64) -> bool {
        self.get_chain_by_id(chain_id).map_or(false, |c| c.enabled)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"
        [bridge]
        native_token = "ETH"
        supported_tokens = ["ETH", "USDC", "USDT"]
        default_chain_id = 1

        [api]
        host = "127.0.0.1"
        port = 8088

        [metrics]
        enabled = false
        port = 9188

        [chains.ethereum]
        chain_id = 1
        name = "Ethereum"
        enabled = true

        [chains.arbitrum]
        chain_id = 42161
        name = "Arbitrum One"
        enabled = true

        [chains.scroll]
        chain_id = 534352
        name = "Scroll"
        enabled = false

        [[sdk.balances]]
        symbol = "USDT"
        fiat_price = 1.0
        chains = [{ chain_id = 1, balance = 30.0 }, { chain_id = 42161, balance = 20.0 }]
    "#;

    pub(crate) fn sample_settings() -> Settings {
        Settings::parse(SAMPLE).unwrap()
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("PAYGATE_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${PAYGATE_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        let settings = sample_settings();
        assert_eq!(settings.bridge.gas_reserve, 0.01);
        assert_eq!(settings.bridge.simulation_debounce_ms, 500);
        assert_eq!(settings.enabled_chains().len(), 2);
        assert!(settings.is_supported_chain(42161));
        assert!(!settings.is_supported_chain(534352));
        assert!(!settings.is_supported_chain(10));
        assert_eq!(settings.sdk.balances[0].chains.len(), 2);
        assert!(settings.sdk.require_intent);
    }

    #[test]
    fn test_rejects_disabled_default_chain() {
        let raw = SAMPLE.replace("default_chain_id = 1", "default_chain_id = 534352");
        let err = Settings::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("534352"));
    }

    #[test]
    fn test_rejects_unknown_native_token() {
        let raw = SAMPLE.replace("native_token = \"ETH\"", "native_token = \"MATIC\"");
        assert!(Settings::parse(&raw).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.api.port, 8088);
        assert_eq!(settings.get_chain_by_id(1).unwrap().name, "Ethereum");
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load_from(Path::new("/nonexistent/paygate.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
