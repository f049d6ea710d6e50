//! Gateway Orchestrator - deposits and cross-chain transfers of a unified
//! USDC balance
//!
//! Drives a custodial signing service and the Gateway attestation authority
//! through two workflows: depositing into the gateway wallet contract, and
//! burning from the unified balance on one chain to mint on another.

pub mod amount;
pub mod api;
pub mod attestation;
pub mod balance;
pub mod chain;
pub mod config;
pub mod encoding;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod poller;
pub mod signer;

pub use error::{GatewayError, GatewayResult};
