//! Unified balance view across every registered chain
//!
//! For each address the aggregator reads the available Gateway balance per
//! domain from the attestation authority and the on-chain token balance per
//! chain. Reads run concurrently, but each upstream sees at most
//! `concurrency` requests at once. A failed read contributes zero and
//! carries an error annotation; aggregation itself never fails.

use crate::amount::{format_units, parse_units};
use crate::attestation::{AttestationApi, BalanceSource, BalancesRequest};
use crate::chain::{ChainInfo, ChainRegistry, TokenBalanceReader};
use crate::metrics;

use alloy_primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reported for gateway balances at domains missing from the registry
pub const UNKNOWN_CHAIN: &str = "unknown";

pub const DEFAULT_MAX_ADDRESSES: usize = 25;
pub const DEFAULT_READ_CONCURRENCY: usize = 8;

/// Balance of one address on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalance {
    pub chain: String,
    pub domain: u32,
    pub address: Address,
    #[serde(serialize_with = "serialize_units")]
    pub amount: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainBalance {
    fn ok(chain: &str, domain: u32, address: Address, amount: U256) -> Self {
        Self {
            chain: chain.to_string(),
            domain,
            address,
            amount,
            error: None,
        }
    }

    fn degraded(chain: &str, domain: u32, address: Address, error: String) -> Self {
        Self {
            chain: chain.to_string(),
            domain,
            address,
            amount: U256::ZERO,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBalances {
    pub address: Address,
    /// Deposited, not yet withdrawn funds held by the gateway
    pub gateway: Vec<ChainBalance>,
    /// Token balances held by the address itself
    pub wallet: Vec<ChainBalance>,
    #[serde(serialize_with = "serialize_units")]
    pub gateway_total: U256,
    #[serde(serialize_with = "serialize_units")]
    pub wallet_total: U256,
    #[serde(serialize_with = "serialize_units")]
    pub total: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBalances {
    pub token: String,
    pub addresses: Vec<AddressBalances>,
    #[serde(serialize_with = "serialize_units")]
    pub total_gateway: U256,
    #[serde(serialize_with = "serialize_units")]
    pub total_wallet: U256,
    #[serde(serialize_with = "serialize_units")]
    pub total_unified: U256,
}

pub struct BalanceAggregator {
    registry: Arc<ChainRegistry>,
    api: Arc<dyn AttestationApi>,
    reader: Arc<dyn TokenBalanceReader>,
    token_symbol: String,
    max_addresses: usize,
    concurrency: usize,
}

impl BalanceAggregator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        api: Arc<dyn AttestationApi>,
        reader: Arc<dyn TokenBalanceReader>,
        token_symbol: &str,
    ) -> Self {
        Self {
            registry,
            api,
            reader,
            token_symbol: token_symbol.to_string(),
            max_addresses: DEFAULT_MAX_ADDRESSES,
            concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }

    pub fn with_limits(mut self, max_addresses: usize, concurrency: usize) -> Self {
        self.max_addresses = max_addresses.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    /// Most addresses a single query may name
    pub fn max_addresses(&self) -> usize {
        self.max_addresses
    }

    /// Balances of every address across every registered chain
    pub async fn aggregate(&self, addresses: &[Address]) -> AggregatedBalances {
        let chains = self.registry.chains();

        let gateway_reads = stream::iter(addresses.iter().copied())
            .map(|address| self.gateway_balances(address, &chains))
            .buffered(self.concurrency)
            .collect::<Vec<_>>();
        let pairs: Vec<(Address, usize)> = addresses
            .iter()
            .flat_map(|a| (0..chains.len()).map(move |i| (*a, i)))
            .collect();
        let wallet_reads = stream::iter(pairs)
            .map(|(address, i)| self.wallet_balance(address, chains[i]))
            .buffered(self.concurrency)
            .collect::<Vec<_>>();
        let (gateway, wallet) = tokio::join!(gateway_reads, wallet_reads);

        // Wallet reads come back address-major, one per chain
        let mut wallet = wallet.into_iter();
        let addresses: Vec<_> = addresses
            .iter()
            .zip(gateway)
            .map(|(address, gateway)| {
                let wallet = wallet.by_ref().take(chains.len()).collect();
                address_balances(*address, gateway, wallet)
            })
            .collect();

        let total_gateway = addresses
            .iter()
            .fold(U256::ZERO, |acc, a| acc.saturating_add(a.gateway_total));
        let total_wallet = addresses
            .iter()
            .fold(U256::ZERO, |acc, a| acc.saturating_add(a.wallet_total));

        AggregatedBalances {
            token: self.token_symbol.clone(),
            addresses,
            total_gateway,
            total_wallet,
            total_unified: total_gateway.saturating_add(total_wallet),
        }
    }

    async fn gateway_balances(&self, address: Address, chains: &[&ChainInfo]) -> Vec<ChainBalance> {
        let request = BalancesRequest {
            token: self.token_symbol.clone(),
            sources: chains
                .iter()
                .map(|c| BalanceSource {
                    domain: c.domain,
                    depositor: address.to_string(),
                })
                .collect(),
        };

        match self.api.balances(&request).await {
            Ok(response) => response
                .balances
                .into_iter()
                .map(|b| {
                    let chain = self
                        .registry
                        .by_domain(b.domain)
                        .map(|c| c.chain.as_str())
                        .unwrap_or(UNKNOWN_CHAIN);
                    match parse_units(&b.balance) {
                        Ok(amount) => ChainBalance::ok(chain, b.domain, address, amount),
                        Err(e) => {
                            warn!(%address, domain = b.domain, "Unreadable gateway balance: {}", e);
                            ChainBalance::degraded(chain, b.domain, address, e.to_string())
                        }
                    }
                })
                .collect(),
            Err(e) => {
                warn!(%address, "Gateway balance query failed: {}", e);
                chains
                    .iter()
                    .map(|c| {
                        metrics::record_balance_failure(c.chain);
                        ChainBalance::degraded(c.chain.as_str(), c.domain, address, e.to_string())
                    })
                    .collect()
            }
        }
    }

    async fn wallet_balance(&self, address: Address, info: &ChainInfo) -> ChainBalance {
        match self.reader.token_balance(info.chain, address).await {
            Ok(amount) => ChainBalance::ok(info.chain.as_str(), info.domain, address, amount),
            Err(e) => {
                warn!(%address, chain = %info.chain, "Token balance read failed: {}", e);
                metrics::record_balance_failure(info.chain);
                ChainBalance::degraded(info.chain.as_str(), info.domain, address, e.to_string())
            }
        }
    }
}

fn address_balances(
    address: Address,
    gateway: Vec<ChainBalance>,
    wallet: Vec<ChainBalance>,
) -> AddressBalances {
    let gateway_total = sum(&gateway);
    let wallet_total = sum(&wallet);
    debug!(
        %address,
        gateway = %format_units(gateway_total),
        wallet = %format_units(wallet_total),
        "Aggregated balances"
    );

    AddressBalances {
        address,
        gateway,
        wallet,
        gateway_total,
        wallet_total,
        total: gateway_total.saturating_add(wallet_total),
    }
}

fn sum(balances: &[ChainBalance]) -> U256 {
    balances
        .iter()
        .fold(U256::ZERO, |acc, b| acc.saturating_add(b.amount))
}

fn serialize_units<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_units(*value))
}
