//! Append-only transaction ledger
//!
//! Every attempted deposit or transfer produces exactly one record. The
//! orchestrator only writes; nothing here is read back into a workflow.

mod postgres;

pub use postgres::PgLedger;

use crate::chain::SupportedChain;
use crate::error::GatewayResult;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Records kept by `MemoryLedger` unless configured otherwise
pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Deposit,
    Transfer,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Success,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Success => "success",
            LedgerStatus::Failed => "failed",
        }
    }
}

/// One attempted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: String,
    pub chain: SupportedChain,
    pub destination_chain: Option<SupportedChain>,
    pub tx_type: TxType,
    /// Decimal amount as requested by the user
    pub amount: String,
    pub tx_hash: Option<String>,
    pub gateway_wallet_address: Address,
    pub status: LedgerStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        user_id: &str,
        tx_type: TxType,
        chain: SupportedChain,
        amount: &str,
        gateway_wallet_address: Address,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            chain,
            destination_chain: None,
            tx_type,
            amount: amount.to_string(),
            tx_hash: None,
            gateway_wallet_address,
            status: LedgerStatus::Failed,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_destination(mut self, chain: SupportedChain) -> Self {
        self.destination_chain = Some(chain);
        self
    }

    pub fn succeeded(mut self, tx_hash: &str) -> Self {
        self.status = LedgerStatus::Success;
        self.tx_hash = Some(tx_hash.to_string());
        self.reason = None;
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = LedgerStatus::Failed;
        self.reason = Some(reason.into());
        self
    }
}

/// Write-only sink for ledger records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> GatewayResult<()>;

    async fn health_check(&self) -> GatewayResult<()>;
}

/// Ledger kept in process memory, used when no database is configured.
///
/// Holds at most `capacity` records; the oldest is evicted first. Every
/// record is also emitted as a log event so nothing is lost silently.
pub struct MemoryLedger {
    entries: RwLock<VecDeque<LedgerEntry>>,
    capacity: usize,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity,
        }
    }

    #[cfg(test)]
    pub(crate) async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
    async fn append(&self, entry: LedgerEntry) -> GatewayResult<()> {
        info!(
            id = %entry.id,
            user_id = %entry.user_id,
            tx_type = entry.tx_type.as_str(),
            chain = %entry.chain,
            amount = %entry.amount,
            status = entry.status.as_str(),
            tx_hash = entry.tx_hash.as_deref().unwrap_or(""),
            reason = entry.reason.as_deref().unwrap_or(""),
            "Ledger record"
        );

        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(id = %evicted.id, "Evicted oldest in-memory ledger record");
            }
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn health_check(&self) -> GatewayResult<()> {
        Ok(())
    }
}
