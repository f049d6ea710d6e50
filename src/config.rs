//! Configuration management for the Gateway orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::SupportedChain;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceConfig,
    pub gateway: GatewayConfig,
    pub custodial: CustodialConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub database: Option<DatabaseConfig>,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub instance_id: String,
    pub confirmation_poll_interval_ms: u64,
    pub attestation_poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub max_amount_whole_units: u64,
    pub max_fee: u64,
    pub request_timeout_ms: u64,
    /// Upper bound on addresses accepted by one balance query
    pub max_balance_addresses: usize,
    /// Balance reads in flight at once, per upstream
    pub balance_read_concurrency: usize,
    /// Records retained by the in-memory ledger
    pub memory_ledger_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_id: "gateway-orchestrator".to_string(),
            confirmation_poll_interval_ms: 2_000,
            attestation_poll_interval_ms: 3_000,
            max_poll_attempts: 150,
            max_amount_whole_units: 1_000_000_000,
            max_fee: 1_010_000,
            request_timeout_ms: 30_000,
            max_balance_addresses: 25,
            balance_read_concurrency: 8,
            memory_ledger_capacity: 10_000,
        }
    }
}

impl ServiceConfig {
    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    pub fn attestation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.attestation_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub api_url: String,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    pub wallet_address: String,
    pub minter_address: String,
}

fn default_token_symbol() -> String {
    "USDC".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustodialConfig {
    pub api_url: String,
    pub api_key: String,
    pub entity_secret_ciphertext: String,
    #[serde(default = "default_deposit_fee_level")]
    pub deposit_fee_level: String,
    #[serde(default = "default_mint_fee_level")]
    pub mint_fee_level: String,
}

fn default_deposit_fee_level() -> String {
    "HIGH".to_string()
}

fn default_mint_fee_level() -> String {
    "MEDIUM".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Per-chain settings; any omitted address falls back to the built-in table
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub domain: Option<u32>,
    pub token_address: Option<String>,
    pub gateway_wallet_address: Option<String>,
    pub gateway_minter_address: Option<String>,
    pub rpc_urls: Vec<String>,
    pub custodial_blockchain: Option<String>,
    pub native_symbol: Option<String>,
    pub display_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("GATEWAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // At least one chain must be enabled
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        let mut domains = HashSet::new();
        for (name, chain) in &self.chains {
            let supported = SupportedChain::from_str(name)
                .map_err(|_| anyhow::anyhow!("Chain {} is not a supported chain", name))?;

            if chain.enabled && chain.rpc_urls.is_empty() {
                anyhow::bail!("Chain {} has no RPC URLs configured", name);
            }

            let domain = chain.domain.unwrap_or_else(|| supported.defaults().domain);
            if !domains.insert(domain) {
                anyhow::bail!("Domain {} is configured for more than one chain", domain);
            }
        }

        if self.service.confirmation_poll_interval_ms == 0
            || self.service.attestation_poll_interval_ms == 0
        {
            anyhow::bail!("Poll intervals must be greater than zero");
        }
        if self.service.max_poll_attempts == 0 {
            anyhow::bail!("max_poll_attempts must be greater than zero");
        }
        if self.service.max_balance_addresses == 0 || self.service.balance_read_concurrency == 0 {
            anyhow::bail!("Balance query limits must be greater than zero");
        }
        if self.service.memory_ledger_capacity == 0 {
            anyhow::bail!("memory_ledger_capacity must be greater than zero");
        }

        if self.database.is_none() {
            tracing::warn!("No database configured - ledger records are kept in memory");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
