//! Custodial signing service contract
//!
//! The orchestrator never holds keys. Contract calls and typed-data
//! signatures are delegated to a custodial wallet service; contract calls
//! resolve asynchronously through a challenge handle polled by
//! `ConfirmationPoller`.

pub mod circle;

pub use circle::CircleSignerClient;

use crate::encoding::TypedData;
use crate::error::{GatewayError, GatewayResult};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Signature bytes returned by the custodial service
pub type Signature = Bytes;

/// Opaque id of an in-flight custodial request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeHandle(pub String);

impl ChallengeHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChallengeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fee tier requested from the custodial service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeLevel {
    Low,
    Medium,
    High,
}

impl FromStr for FeeLevel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(FeeLevel::Low),
            "MEDIUM" => Ok(FeeLevel::Medium),
            "HIGH" => Ok(FeeLevel::High),
            other => Err(GatewayError::Config(format!("Unknown fee level: {}", other))),
        }
    }
}

/// How the custodial wallet executing a call is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    WalletId(String),
    /// Address plus the custodial service's blockchain code
    WalletAddress { address: Address, blockchain: String },
}

/// A contract execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub target: CallTarget,
    pub contract_address: Address,
    /// ABI signature, e.g. `approve(address,uint256)`
    pub function_signature: String,
    pub args: Vec<String>,
    pub fee_level: FeeLevel,
}

/// Lifecycle state of a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeState {
    /// Not yet terminal; carries the upstream state name
    Submitted(String),
    Confirmed,
    Complete,
    /// Terminal failure; carries the upstream state name
    Failed(String),
}

impl ChallengeState {
    pub fn parse(state: &str) -> Self {
        match state {
            "CONFIRMED" => ChallengeState::Confirmed,
            "COMPLETE" => ChallengeState::Complete,
            "FAILED" | "CANCELLED" | "DENIED" => ChallengeState::Failed(state.to_string()),
            other => ChallengeState::Submitted(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeState::Submitted(_))
    }
}

/// One observation of a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeStatus {
    pub state: ChallengeState,
    pub tx_hash: Option<String>,
    /// Coded failure reason, present on failed challenges
    pub error_reason: Option<String>,
}

/// Remote custodial wallet capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustodialSigner: Send + Sync {
    /// Submit a contract execution; resolves via `challenge_status`
    async fn submit_contract_call(&self, call: ContractCall) -> GatewayResult<ChallengeHandle>;

    /// Sign a structured message with the wallet's key
    async fn sign_typed_data(&self, wallet_id: &str, typed_data: &TypedData)
        -> GatewayResult<Signature>;

    /// Current state of a submitted challenge
    async fn challenge_status(&self, handle: &ChallengeHandle) -> GatewayResult<ChallengeStatus>;

    /// On-chain address of a custodial wallet
    async fn wallet_address(&self, wallet_id: &str) -> GatewayResult<Address>;
}
