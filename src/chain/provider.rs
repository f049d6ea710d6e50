//! Chain provider with multi-RPC support and automatic failover

use super::{ChainInfo, ChainRegistry, SupportedChain};
use crate::error::{GatewayError, GatewayResult};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, Provider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

/// Reads token balances from registered chains
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenBalanceReader: Send + Sync {
    /// `balanceOf(owner)` on the chain's registered token contract
    async fn token_balance(&self, chain: SupportedChain, owner: Address) -> GatewayResult<U256>;

    /// RPC reachability of every chain
    async fn chain_health(&self) -> Vec<(SupportedChain, bool)>;
}

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    chain: SupportedChain,
    /// Token contract queried for balances
    token_address: ethers::types::Address,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Arc<Provider<Http>>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(info: &ChainInfo) -> GatewayResult<Self> {
        let mut http_providers = Vec::new();

        for url in &info.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(Arc::new(provider));
                    debug!("Added HTTP provider for chain {}: {}", info.chain, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(GatewayError::Config(format!(
                "No valid RPC providers for chain {}",
                info.chain
            )));
        }

        Ok(Self {
            chain: info.chain,
            token_address: to_ethers_address(info.token_address),
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> Arc<Provider<Http>> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        self.http_providers[idx % self.http_providers.len()].clone()
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain, next);
    }

    /// Token balance of `owner`, trying every provider once
    pub async fn token_balance(&self, owner: Address) -> GatewayResult<U256> {
        let owner = to_ethers_address(owner);

        for _ in 0..self.http_providers.len() {
            let token = Erc20::new(self.token_address, self.http());
            match token.balance_of(owner).call().await {
                Ok(balance) => return Ok(U256::from_limbs(balance.0)),
                Err(e) => {
                    warn!("Failed to read balance on chain {}: {}", self.chain, e);
                    self.failover();
                }
            }
        }

        Err(GatewayError::Network(format!(
            "All providers failed for chain {}",
            self.chain
        )))
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.http().get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.chain, e);
                false
            }
        }
    }

    pub fn chain(&self) -> SupportedChain {
        self.chain
    }
}

/// Providers for every registered chain
pub struct ChainReader {
    providers: HashMap<SupportedChain, ChainProvider>,
}

impl ChainReader {
    pub fn new(registry: &ChainRegistry) -> GatewayResult<Self> {
        let mut providers = HashMap::new();
        for info in registry.chains() {
            providers.insert(info.chain, ChainProvider::new(info)?);
        }
        Ok(Self { providers })
    }
}

#[async_trait]
impl TokenBalanceReader for ChainReader {
    async fn token_balance(&self, chain: SupportedChain, owner: Address) -> GatewayResult<U256> {
        let provider = self
            .providers
            .get(&chain)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain.to_string()))?;
        provider.token_balance(owner).await
    }

    async fn chain_health(&self) -> Vec<(SupportedChain, bool)> {
        let checks = self.providers.values().map(|p| async move {
            let healthy = p.health_check().await;
            crate::metrics::record_chain_health(p.chain(), healthy);
            (p.chain(), healthy)
        });
        let mut health = futures::future::join_all(checks).await;
        health.sort_by_key(|(chain, _)| *chain);
        health
    }
}

fn to_ethers_address(address: Address) -> ethers::types::Address {
    ethers::types::Address::from_slice(address.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversion_preserves_bytes() {
        let addr = crate::chain::GATEWAY_WALLET_ADDRESS;
        assert_eq!(to_ethers_address(addr).as_bytes(), addr.as_slice());
    }

    #[test]
    fn test_reader_builds_provider_per_chain() {
        let registry = ChainRegistry::testnet();
        let reader = ChainReader::new(&registry).unwrap();
        assert_eq!(reader.providers.len(), 3);
    }
}
