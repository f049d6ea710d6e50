//! Chain module - registry of supported chains and on-chain token reads
//!
//! This module provides:
//! - The `SupportedChain` variant set and its built-in testnet table
//! - `ChainRegistry`, the single lookup point for per-chain configuration
//! - Multi-RPC providers for `balanceOf` reads with automatic failover

pub mod provider;

pub use provider::{ChainProvider, ChainReader, TokenBalanceReader};

use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Gateway wallet contract, identical on every supported chain
pub const GATEWAY_WALLET_ADDRESS: Address = address!("0077777d7EBA4688BDeF3E311b846F25870A19B9");

/// Gateway minter contract, identical on every supported chain
pub const GATEWAY_MINTER_ADDRESS: Address = address!("0022222ABE238Cc2C7Bb1f21003F0a260052475B");

/// Chains registered with the attestation authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupportedChain {
    ArcTestnet,
    AvalancheFuji,
    BaseSepolia,
}

/// Built-in values for a supported chain
#[derive(Debug, Clone, Copy)]
pub struct ChainDefaults {
    pub name: &'static str,
    pub domain: u32,
    pub network_id: u64,
    pub token_address: Address,
    pub native_symbol: &'static str,
    pub custodial_blockchain: &'static str,
    pub rpc_url: &'static str,
}

impl SupportedChain {
    pub const ALL: [SupportedChain; 3] = [
        SupportedChain::ArcTestnet,
        SupportedChain::AvalancheFuji,
        SupportedChain::BaseSepolia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedChain::ArcTestnet => "arcTestnet",
            SupportedChain::AvalancheFuji => "avalancheFuji",
            SupportedChain::BaseSepolia => "baseSepolia",
        }
    }

    /// Built-in testnet table
    pub fn defaults(&self) -> ChainDefaults {
        match self {
            SupportedChain::ArcTestnet => ChainDefaults {
                name: "Arc Testnet",
                domain: 26,
                network_id: 5042002,
                token_address: address!("3600000000000000000000000000000000000000"),
                native_symbol: "USDC",
                custodial_blockchain: "ARC-TESTNET",
                rpc_url: "https://rpc.testnet.arc.network",
            },
            SupportedChain::AvalancheFuji => ChainDefaults {
                name: "Avalanche Fuji",
                domain: 1,
                network_id: 43113,
                token_address: address!("5425890298aed601595a70ab815c96711a31bc65"),
                native_symbol: "AVAX",
                custodial_blockchain: "AVAX-FUJI",
                rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
            },
            SupportedChain::BaseSepolia => ChainDefaults {
                name: "Base Sepolia",
                domain: 6,
                network_id: 84532,
                token_address: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
                native_symbol: "ETH",
                custodial_blockchain: "BASE-SEPOLIA",
                rpc_url: "https://sepolia.base.org",
            },
        }
    }
}

impl fmt::Display for SupportedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportedChain {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupportedChain::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| GatewayError::UnsupportedChain(s.to_string()))
    }
}

/// Resolved configuration for one registered chain
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain: SupportedChain,
    pub name: String,
    pub domain: u32,
    pub network_id: u64,
    pub token_address: Address,
    pub gateway_wallet_address: Address,
    pub gateway_minter_address: Address,
    #[serde(skip_serializing)]
    pub rpc_urls: Vec<String>,
    pub native_symbol: String,
    pub custodial_blockchain: String,
}

impl ChainInfo {
    fn from_defaults(chain: SupportedChain) -> Self {
        let d = chain.defaults();
        Self {
            chain,
            name: d.name.to_string(),
            domain: d.domain,
            network_id: d.network_id,
            token_address: d.token_address,
            gateway_wallet_address: GATEWAY_WALLET_ADDRESS,
            gateway_minter_address: GATEWAY_MINTER_ADDRESS,
            rpc_urls: vec![d.rpc_url.to_string()],
            native_symbol: d.native_symbol.to_string(),
            custodial_blockchain: d.custodial_blockchain.to_string(),
        }
    }
}

/// Static catalog of the chains this process serves
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<SupportedChain, ChainInfo>,
}

impl ChainRegistry {
    /// Registry with every supported chain at its built-in testnet values
    pub fn testnet() -> Self {
        let chains = SupportedChain::ALL
            .iter()
            .map(|c| (*c, ChainInfo::from_defaults(*c)))
            .collect();
        Self { chains }
    }

    /// Build the registry from configuration; disabled chains are left out
    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let wallet = parse_address(&settings.gateway.wallet_address)?;
        let minter = parse_address(&settings.gateway.minter_address)?;

        let mut chains = HashMap::new();
        for (name, cfg) in settings.enabled_chains() {
            let chain = SupportedChain::from_str(name)?;
            let mut info = ChainInfo::from_defaults(chain);

            info.gateway_wallet_address = wallet;
            info.gateway_minter_address = minter;
            if let Some(domain) = cfg.domain {
                info.domain = domain;
            }
            if let Some(ref token) = cfg.token_address {
                info.token_address = parse_address(token)?;
            }
            if let Some(ref w) = cfg.gateway_wallet_address {
                info.gateway_wallet_address = parse_address(w)?;
            }
            if let Some(ref m) = cfg.gateway_minter_address {
                info.gateway_minter_address = parse_address(m)?;
            }
            if let Some(ref b) = cfg.custodial_blockchain {
                info.custodial_blockchain = b.clone();
            }
            if let Some(ref symbol) = cfg.native_symbol {
                info.native_symbol = symbol.clone();
            }
            if let Some(ref name) = cfg.display_name {
                info.name = name.clone();
            }
            info.rpc_urls = cfg.rpc_urls.clone();

            debug!("Registered chain {} (domain {})", chain, info.domain);
            chains.insert(chain, info);
        }

        info!("Chain registry initialized with {} chains", chains.len());
        Ok(Self { chains })
    }

    /// Look up a registered chain
    pub fn lookup(&self, chain: SupportedChain) -> GatewayResult<&ChainInfo> {
        self.chains
            .get(&chain)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain.to_string()))
    }

    /// Parse a chain name and look it up
    pub fn resolve(&self, name: &str) -> GatewayResult<&ChainInfo> {
        let chain = SupportedChain::from_str(name)?;
        self.lookup(chain)
    }

    /// Reverse lookup by attestation domain id
    pub fn by_domain(&self, domain: u32) -> Option<&ChainInfo> {
        self.chains.values().find(|c| c.domain == domain)
    }

    /// All registered chains, ordered by variant
    pub fn chains(&self) -> Vec<&ChainInfo> {
        let mut chains: Vec<_> = self.chains.values().collect();
        chains.sort_by_key(|c| c.chain);
        chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

fn parse_address(value: &str) -> GatewayResult<Address> {
    Address::from_str(value)
        .map_err(|e| GatewayError::Config(format!("Invalid address {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_chains() {
        let registry = ChainRegistry::testnet();
        assert_eq!(registry.len(), 3);

        let arc = registry.resolve("arcTestnet").unwrap();
        assert_eq!(arc.domain, 26);
        assert_eq!(arc.gateway_wallet_address, GATEWAY_WALLET_ADDRESS);

        let base = registry.lookup(SupportedChain::BaseSepolia).unwrap();
        assert_eq!(base.domain, 6);
        assert_eq!(base.custodial_blockchain, "BASE-SEPOLIA");

        assert_eq!(registry.resolve("avalancheFuji").unwrap().domain, 1);
    }

    #[test]
    fn test_unknown_chain_is_unsupported() {
        let registry = ChainRegistry::testnet();
        let err = registry.resolve("ethereum").unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedChain(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_by_domain() {
        let registry = ChainRegistry::testnet();
        assert_eq!(
            registry.by_domain(6).map(|c| c.chain),
            Some(SupportedChain::BaseSepolia)
        );
        assert!(registry.by_domain(99).is_none());
    }

    #[test]
    fn test_from_settings_applies_overrides() {
        let settings = Settings::parse(
            r#"
            [gateway]
            api_url = "https://gateway-api-testnet.circle.com"
            wallet_address = "0x0077777d7EBA4688BDeF3E311b846F25870A19B9"
            minter_address = "0x0022222ABE238Cc2C7Bb1f21003F0a260052475B"

            [custodial]
            api_url = "https://api.circle.com"
            api_key = "key"
            entity_secret_ciphertext = "cipher"

            [api]
            host = "127.0.0.1"
            port = 8080

            [chains.arcTestnet]
            rpc_urls = ["https://rpc.example"]
            native_symbol = "aUSDC"
            display_name = "Arc"

            [chains.baseSepolia]
            rpc_urls = ["https://sepolia.base.org"]
            enabled = false
            "#,
        )
        .unwrap();

        let registry = ChainRegistry::from_settings(&settings).unwrap();
        assert_eq!(registry.len(), 1);

        let arc = registry.lookup(SupportedChain::ArcTestnet).unwrap();
        assert_eq!(arc.name, "Arc");
        assert_eq!(arc.native_symbol, "aUSDC");
        assert_eq!(arc.domain, 26);
        assert_eq!(arc.rpc_urls, vec!["https://rpc.example".to_string()]);
        assert!(registry.lookup(SupportedChain::BaseSepolia).is_err());
    }

    #[test]
    fn test_chain_name_round_trip() {
        for chain in SupportedChain::ALL {
            assert_eq!(SupportedChain::from_str(chain.as_str()).unwrap(), chain);
        }
        let json = serde_json::to_string(&SupportedChain::ArcTestnet).unwrap();
        assert_eq!(json, "\"arcTestnet\"");
    }
}
