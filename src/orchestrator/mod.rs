//! Transfer orchestration
//!
//! Sequences the custodial signer, confirmation poller and attestation
//! client into the two end-to-end workflows:
//! - Deposit: approve -> deposit -> confirm
//! - CrossChainTransfer: sign -> submit -> await attestation -> mint -> confirm
//!
//! Each stage aborts the pipeline on failure. Completed on-chain stages are
//! never rolled back or retried here.

mod salt;

pub use salt::{RandomSalt, SaltSource};

use crate::amount::{format_units, AmountConverter};
use crate::attestation::{AttestationApi, AttestationClient};
use crate::chain::{ChainInfo, ChainRegistry, SupportedChain};
use crate::config::Settings;
use crate::encoding::{
    encode_burn_intent, parse_address, signing_hash, BurnIntent, BurnIntentSpec,
    TRANSFER_SPEC_VERSION,
};
use crate::error::{GatewayError, GatewayResult};
use crate::ledger::{LedgerEntry, TransactionLedger, TxType};
use crate::metrics;
use crate::poller::{ConfirmationPoller, PollConfig};
use crate::signer::{CallTarget, ContractCall, CustodialSigner, FeeLevel};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const APPROVE_SIGNATURE: &str = "approve(address,uint256)";
const DEPOSIT_SIGNATURE: &str = "deposit(address,uint256)";
const MINT_SIGNATURE: &str = "gatewayMint(bytes,bytes)";

/// Protocol parameters and polling bounds for both workflows
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Protocol-level fee cap carried in every burn intent
    pub max_fee: U256,
    pub deposit_fee_level: FeeLevel,
    pub mint_fee_level: FeeLevel,
    pub confirmation_poll: PollConfig,
    pub attestation_poll: PollConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_fee: U256::from(1_010_000u64),
            deposit_fee_level: FeeLevel::High,
            mint_fee_level: FeeLevel::Medium,
            confirmation_poll: PollConfig::new(Duration::from_secs(2), 150),
            attestation_poll: PollConfig::new(Duration::from_secs(3), 150),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let service = &settings.service;
        Ok(Self {
            max_fee: U256::from(service.max_fee),
            deposit_fee_level: FeeLevel::from_str(&settings.custodial.deposit_fee_level)?,
            mint_fee_level: FeeLevel::from_str(&settings.custodial.mint_fee_level)?,
            confirmation_poll: PollConfig::new(
                service.confirmation_poll_interval(),
                service.max_poll_attempts,
            ),
            attestation_poll: PollConfig::new(
                service.attestation_poll_interval(),
                service.max_poll_attempts,
            ),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub user_id: String,
    pub wallet_id: String,
    pub chain: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub user_id: String,
    pub wallet_id: String,
    pub source_chain: String,
    pub destination_chain: String,
    pub amount: String,
    pub recipient_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResult {
    /// Hash of the confirmed deposit transaction
    pub tx_hash: String,
    pub approval_tx_hash: String,
    pub chain: SupportedChain,
    pub amount: String,
}

/// Outcome of a cross-chain transfer.
///
/// No source-chain burn hash is reported: the authority burns against the
/// deposit and does not return one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub attestation: Bytes,
    pub mint_tx_hash: String,
    pub transfer_id: String,
    pub source_chain: SupportedChain,
    pub destination_chain: SupportedChain,
    pub recipient: Address,
    pub amount: String,
}

/// Drives deposits and cross-chain transfers
pub struct TransferOrchestrator {
    registry: Arc<ChainRegistry>,
    converter: AmountConverter,
    signer: Arc<dyn CustodialSigner>,
    poller: ConfirmationPoller,
    attestation: AttestationClient,
    ledger: Arc<dyn TransactionLedger>,
    salt: Arc<dyn SaltSource>,
    config: OrchestratorConfig,
}

impl TransferOrchestrator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        converter: AmountConverter,
        signer: Arc<dyn CustodialSigner>,
        attestation_api: Arc<dyn AttestationApi>,
        ledger: Arc<dyn TransactionLedger>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            converter,
            poller: ConfirmationPoller::new(signer.clone()),
            signer,
            attestation: AttestationClient::new(attestation_api),
            ledger,
            salt: Arc::new(RandomSalt),
            config,
        }
    }

    /// Replace the salt source
    pub fn with_salt_source(mut self, salt: Arc<dyn SaltSource>) -> Self {
        self.salt = salt;
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Approve the gateway wallet, deposit into it and wait for confirmation
    pub async fn deposit(
        &self,
        request: DepositRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<DepositResult> {
        let started = Instant::now();
        require_field("userId", &request.user_id)?;
        require_field("walletId", &request.wallet_id)?;
        let chain = self.registry.resolve(&request.chain)?;
        let amount = self.converter.to_atomic_units(&request.amount)?;

        info!(
            wallet_id = %request.wallet_id,
            chain = %chain.chain,
            amount = %format_units(amount),
            "Starting deposit"
        );

        let entry = LedgerEntry::new(
            &request.user_id,
            TxType::Deposit,
            chain.chain,
            &format_units(amount),
            chain.gateway_wallet_address,
        );

        let outcome = self
            .run_deposit(&request.wallet_id, chain, amount, cancel)
            .await;

        self.record(
            "deposit",
            entry,
            outcome.as_ref().map(|r| r.tx_hash.as_str()),
            started,
        )
        .await;
        outcome
    }

    async fn run_deposit(
        &self,
        wallet_id: &str,
        chain: &ChainInfo,
        amount: U256,
        cancel: &CancellationToken,
    ) -> GatewayResult<DepositResult> {
        ensure_active(cancel, "approval")?;
        let approve = ContractCall {
            target: CallTarget::WalletId(wallet_id.to_string()),
            contract_address: chain.token_address,
            function_signature: APPROVE_SIGNATURE.to_string(),
            args: vec![chain.gateway_wallet_address.to_string(), amount.to_string()],
            fee_level: self.config.deposit_fee_level,
        };
        let handle = self.signer.submit_contract_call(approve).await?;
        info!(challenge_id = %handle, "Approval submitted, awaiting confirmation");
        let approval_tx_hash = self
            .poller
            .await_confirmation(&handle, &self.config.confirmation_poll, cancel)
            .await?;

        ensure_active(cancel, "deposit")?;
        let deposit = ContractCall {
            target: CallTarget::WalletId(wallet_id.to_string()),
            contract_address: chain.gateway_wallet_address,
            function_signature: DEPOSIT_SIGNATURE.to_string(),
            args: vec![chain.token_address.to_string(), amount.to_string()],
            fee_level: self.config.deposit_fee_level,
        };
        let handle = self.signer.submit_contract_call(deposit).await?;
        info!(challenge_id = %handle, "Deposit submitted, awaiting confirmation");
        let tx_hash = self
            .poller
            .await_confirmation(&handle, &self.config.confirmation_poll, cancel)
            .await?;

        info!(chain = %chain.chain, %tx_hash, "Deposit confirmed");
        Ok(DepositResult {
            tx_hash,
            approval_tx_hash,
            chain: chain.chain,
            amount: format_units(amount),
        })
    }

    /// Burn from the unified balance on the source chain and mint on the
    /// destination chain
    pub async fn cross_chain_transfer(
        &self,
        request: TransferRequest,
        cancel: &CancellationToken,
    ) -> GatewayResult<TransferResult> {
        let started = Instant::now();
        require_field("userId", &request.user_id)?;
        require_field("walletId", &request.wallet_id)?;
        let source = self.registry.resolve(&request.source_chain)?;
        let destination = self.registry.resolve(&request.destination_chain)?;
        if source.chain == destination.chain {
            return Err(GatewayError::Validation(
                "Source and destination chains must be different".to_string(),
            ));
        }
        let amount = self.converter.to_atomic_units(&request.amount)?;
        let recipient = request
            .recipient_address
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(parse_address)
            .transpose()?;

        info!(
            wallet_id = %request.wallet_id,
            source = %source.chain,
            destination = %destination.chain,
            amount = %format_units(amount),
            "Starting cross-chain transfer"
        );

        let entry = LedgerEntry::new(
            &request.user_id,
            TxType::Transfer,
            source.chain,
            &format_units(amount),
            source.gateway_wallet_address,
        )
        .with_destination(destination.chain);

        let outcome = self
            .run_transfer(&request.wallet_id, source, destination, amount, recipient, cancel)
            .await;

        self.record(
            "transfer",
            entry,
            outcome.as_ref().map(|r| r.mint_tx_hash.as_str()),
            started,
        )
        .await;
        outcome
    }

    async fn run_transfer(
        &self,
        wallet_id: &str,
        source: &ChainInfo,
        destination: &ChainInfo,
        amount: U256,
        recipient: Option<Address>,
        cancel: &CancellationToken,
    ) -> GatewayResult<TransferResult> {
        let depositor = self.signer.wallet_address(wallet_id).await?;
        let recipient = recipient.unwrap_or(depositor);

        let intent = BurnIntent {
            max_block_height: U256::MAX,
            max_fee: self.config.max_fee,
            spec: BurnIntentSpec {
                version: TRANSFER_SPEC_VERSION,
                source_domain: source.domain,
                destination_domain: destination.domain,
                source_contract: source.gateway_wallet_address,
                destination_contract: destination.gateway_minter_address,
                source_token: source.token_address,
                destination_token: destination.token_address,
                source_depositor: depositor,
                destination_recipient: recipient,
                source_signer: depositor,
                destination_caller: Address::ZERO,
                value: amount,
                salt: self.salt.next_salt(),
                hook_data: Bytes::new(),
            },
        };
        intent.spec.validate()?;

        let typed_data = encode_burn_intent(&intent);
        debug!(
            digest = %signing_hash(&typed_data.message),
            "Requesting burn intent signature"
        );
        let signature = self.signer.sign_typed_data(wallet_id, &typed_data).await?;

        ensure_active(cancel, "attestation")?;
        let record = self
            .attestation
            .attest(
                &typed_data.message,
                &signature,
                &self.config.attestation_poll,
                cancel,
            )
            .await?;

        ensure_active(cancel, "mint")?;
        let mint = ContractCall {
            target: CallTarget::WalletAddress {
                address: depositor,
                blockchain: destination.custodial_blockchain.clone(),
            },
            contract_address: destination.gateway_minter_address,
            function_signature: MINT_SIGNATURE.to_string(),
            args: vec![
                format!("0x{}", hex::encode(&record.attestation)),
                format!("0x{}", hex::encode(&record.signature)),
            ],
            fee_level: self.config.mint_fee_level,
        };
        let handle = self.signer.submit_contract_call(mint).await?;
        info!(
            challenge_id = %handle,
            transfer_id = %record.transfer_id,
            "Mint submitted, awaiting confirmation"
        );
        let mint_tx_hash = self
            .poller
            .await_confirmation(&handle, &self.config.confirmation_poll, cancel)
            .await?;

        info!(%mint_tx_hash, destination = %destination.chain, "Transfer complete");
        Ok(TransferResult {
            attestation: record.attestation,
            mint_tx_hash,
            transfer_id: record.transfer_id,
            source_chain: source.chain,
            destination_chain: destination.chain,
            recipient,
            amount: format_units(amount),
        })
    }

    /// Write the ledger record and metrics for one finished attempt
    async fn record(
        &self,
        workflow: &str,
        entry: LedgerEntry,
        outcome: Result<&str, &GatewayError>,
        started: Instant,
    ) {
        let (entry, status) = match outcome {
            Ok(tx_hash) => (entry.succeeded(tx_hash), "success"),
            Err(e) => {
                warn!(workflow, category = ?e.category(), "Workflow failed: {}", e);
                (entry.failed(e.to_string()), "failed")
            }
        };

        metrics::record_workflow(workflow, status, started.elapsed().as_secs_f64());

        if let Err(e) = self.ledger.append(entry).await {
            warn!(workflow, "Failed to record ledger entry: {}", e);
        }
    }
}

fn require_field(name: &str, value: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{} is required", name)));
    }
    Ok(())
}

fn ensure_active(cancel: &CancellationToken, stage: &str) -> GatewayResult<()> {
    if cancel.is_cancelled() {
        return Err(GatewayError::Cancelled {
            operation: stage.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{MockAttestationApi, SubmitResponse, TransferStatus};
    use crate::chain::{GATEWAY_MINTER_ADDRESS, GATEWAY_WALLET_ADDRESS};
    use crate::error::{ErrorCategory, FailureCode};
    use crate::ledger::{LedgerStatus, MockTransactionLedger};
    use crate::signer::{ChallengeHandle, ChallengeState, ChallengeStatus, MockCustodialSigner};
    use alloy_primitives::{address, B256};

    const DEPOSITOR: Address = address!("AbCdEf0123456789aBcDeF0123456789AbCdEf01");

    struct FixedSalt;

    impl SaltSource for FixedSalt {
        fn next_salt(&self) -> B256 {
            B256::repeat_byte(7)
        }
    }

    fn confirmed(hash: &str) -> ChallengeStatus {
        ChallengeStatus {
            state: ChallengeState::Confirmed,
            tx_hash: Some(hash.to_string()),
            error_reason: None,
        }
    }

    fn orchestrator(
        signer: MockCustodialSigner,
        api: MockAttestationApi,
        ledger: MockTransactionLedger,
    ) -> TransferOrchestrator {
        TransferOrchestrator::new(
            Arc::new(ChainRegistry::testnet()),
            AmountConverter::default(),
            Arc::new(signer),
            Arc::new(api),
            Arc::new(ledger),
            OrchestratorConfig::default(),
        )
        .with_salt_source(Arc::new(FixedSalt))
    }

    fn deposit_request(chain: &str, amount: &str) -> DepositRequest {
        DepositRequest {
            user_id: "user-1".to_string(),
            wallet_id: "wallet-1".to_string(),
            chain: chain.to_string(),
            amount: amount.to_string(),
        }
    }

    fn transfer_request(source: &str, destination: &str, amount: &str) -> TransferRequest {
        TransferRequest {
            user_id: "user-1".to_string(),
            wallet_id: "wallet-1".to_string(),
            source_chain: source.to_string(),
            destination_chain: destination.to_string(),
            amount: amount.to_string(),
            recipient_address: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_end_to_end() {
        let mut signer = MockCustodialSigner::new();
        signer
            .expect_submit_contract_call()
            .withf(|call| {
                call.target == CallTarget::WalletId("wallet-1".to_string())
                    && call.fee_level == FeeLevel::High
                    && call.args[1] == "10000000"
            })
            .times(2)
            .returning(|call| {
                let id = match call.function_signature.as_str() {
                    APPROVE_SIGNATURE => {
                        assert_eq!(call.args[0], GATEWAY_WALLET_ADDRESS.to_string());
                        "approve-1"
                    }
                    DEPOSIT_SIGNATURE => {
                        assert_eq!(call.contract_address, GATEWAY_WALLET_ADDRESS);
                        "deposit-1"
                    }
                    other => panic!("unexpected call {}", other),
                };
                Ok(ChallengeHandle(id.to_string()))
            });
        signer.expect_challenge_status().returning(|handle| {
            Ok(match handle.as_str() {
                "approve-1" => confirmed("0xa11"),
                _ => confirmed("0xabc123"),
            })
        });

        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .withf(|entry| {
                entry.status == LedgerStatus::Success
                    && entry.tx_type == TxType::Deposit
                    && entry.tx_hash.as_deref() == Some("0xabc123")
            })
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(signer, MockAttestationApi::new(), ledger);
        let result = orchestrator
            .deposit(deposit_request("arcTestnet", "10.00"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.tx_hash, "0xabc123");
        assert_eq!(result.approval_tx_hash, "0xa11");
        assert_eq!(result.chain, SupportedChain::ArcTestnet);
        assert_eq!(result.amount, "10.000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_stops_after_failed_approval() {
        let mut signer = MockCustodialSigner::new();
        signer
            .expect_submit_contract_call()
            .times(1)
            .returning(|_| Ok(ChallengeHandle("approve-1".to_string())));
        signer.expect_challenge_status().returning(|_| {
            Ok(ChallengeStatus {
                state: ChallengeState::Failed("FAILED".to_string()),
                tx_hash: None,
                error_reason: Some("INSUFFICIENT_NATIVE_TOKEN".to_string()),
            })
        });

        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .withf(|entry| entry.status == LedgerStatus::Failed && entry.reason.is_some())
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(signer, MockAttestationApi::new(), ledger);
        let err = orchestrator
            .deposit(deposit_request("baseSepolia", "1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.failure_code(), Some(FailureCode::InsufficientNativeToken));
        assert_eq!(err.category(), ErrorCategory::InsufficientGas);
    }

    #[tokio::test]
    async fn test_deposit_validation_makes_no_calls() {
        let orchestrator = orchestrator(
            MockCustodialSigner::new(),
            MockAttestationApi::new(),
            MockTransactionLedger::new(),
        );
        let cancel = CancellationToken::new();

        let err = orchestrator
            .deposit(deposit_request("ethereum", "10"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedChain(_)));

        let err = orchestrator
            .deposit(deposit_request("arcTestnet", "0"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancelled_deposit_is_recorded() {
        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .withf(|entry| entry.status == LedgerStatus::Failed)
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator =
            orchestrator(MockCustodialSigner::new(), MockAttestationApi::new(), ledger);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .deposit(deposit_request("arcTestnet", "10"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_failure_does_not_change_outcome() {
        let mut signer = MockCustodialSigner::new();
        signer
            .expect_submit_contract_call()
            .returning(|_| Ok(ChallengeHandle("c".to_string())));
        signer
            .expect_challenge_status()
            .returning(|_| Ok(confirmed("0xabc")));

        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .times(1)
            .returning(|_| Err(GatewayError::Internal("ledger down".to_string())));

        let orchestrator = orchestrator(signer, MockAttestationApi::new(), ledger);
        let result = orchestrator
            .deposit(deposit_request("avalancheFuji", "2.5"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.tx_hash, "0xabc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_arc_to_base() {
        let mut signer = MockCustodialSigner::new();
        signer
            .expect_wallet_address()
            .withf(|wallet_id| wallet_id == "wallet-1")
            .returning(|_| Ok(DEPOSITOR));
        signer
            .expect_sign_typed_data()
            .withf(|wallet_id, typed| {
                let spec = &typed.message.spec;
                wallet_id == "wallet-1"
                    && spec.source_domain == 26
                    && spec.destination_domain == 6
                    && spec.value == U256::from(5_000_000u64)
                    && spec.salt == B256::repeat_byte(7)
                    && spec.destination_recipient == DEPOSITOR.into_word()
                    && spec.destination_caller == B256::ZERO
                    && typed.message.max_block_height == U256::MAX
            })
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(&[0x51])));
        signer
            .expect_submit_contract_call()
            .withf(|call| {
                call.function_signature == MINT_SIGNATURE
                    && call.contract_address == GATEWAY_MINTER_ADDRESS
                    && call.fee_level == FeeLevel::Medium
                    && call.target
                        == CallTarget::WalletAddress {
                            address: DEPOSITOR,
                            blockchain: "BASE-SEPOLIA".to_string(),
                        }
                    && call.args == vec!["0xaa".to_string(), "0xbb".to_string()]
            })
            .times(1)
            .returning(|_| Ok(ChallengeHandle("mint-1".to_string())));
        signer
            .expect_challenge_status()
            .returning(|_| Ok(confirmed("0xdef")));

        let mut api = MockAttestationApi::new();
        api.expect_submit_transfer()
            .withf(|message, signature| {
                message.spec.source_domain == 26 && signature.to_vec() == vec![0x51u8]
            })
            .times(1)
            .returning(|_, _| {
                Ok(SubmitResponse {
                    attestation: Some(Bytes::from_static(&[0xaa])),
                    signature: Some(Bytes::from_static(&[0xbb])),
                    transfer_id: "t-1".to_string(),
                    fees: None,
                })
            });
        api.expect_transfer_status().times(0);

        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .withf(|entry| {
                entry.status == LedgerStatus::Success
                    && entry.destination_chain == Some(SupportedChain::BaseSepolia)
                    && entry.tx_hash.as_deref() == Some("0xdef")
            })
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(signer, api, ledger);
        let result = orchestrator
            .cross_chain_transfer(
                transfer_request("arcTestnet", "baseSepolia", "5"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.mint_tx_hash, "0xdef");
        assert_eq!(result.transfer_id, "t-1");
        assert_eq!(result.source_chain, SupportedChain::ArcTestnet);
        assert_eq!(result.destination_chain, SupportedChain::BaseSepolia);
        assert_eq!(result.recipient, DEPOSITOR);
        assert_eq!(result.amount, "5.000000");
    }

    #[tokio::test]
    async fn test_same_chain_transfer_rejected() {
        let orchestrator = orchestrator(
            MockCustodialSigner::new(),
            MockAttestationApi::new(),
            MockTransactionLedger::new(),
        );

        let err = orchestrator
            .cross_chain_transfer(
                transfer_request("arcTestnet", "arcTestnet", "5"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let orchestrator = orchestrator(
            MockCustodialSigner::new(),
            MockAttestationApi::new(),
            MockTransactionLedger::new(),
        );
        let mut request = transfer_request("arcTestnet", "baseSepolia", "5");
        request.recipient_address = Some("0x1234".to_string());

        let err = orchestrator
            .cross_chain_transfer(request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attestation_skips_mint() {
        let mut signer = MockCustodialSigner::new();
        signer
            .expect_wallet_address()
            .returning(|_| Ok(DEPOSITOR));
        signer
            .expect_sign_typed_data()
            .returning(|_, _| Ok(Bytes::from_static(&[0x51])));
        signer.expect_submit_contract_call().times(0);

        let mut api = MockAttestationApi::new();
        api.expect_submit_transfer().times(1).returning(|_, _| {
            Ok(SubmitResponse {
                attestation: None,
                signature: None,
                transfer_id: "t-9".to_string(),
                fees: None,
            })
        });
        api.expect_transfer_status().times(1).returning(|_| {
            Ok(TransferStatus {
                status: Some("FAILED".to_string()),
                attestation: None,
                signature: None,
                detail: serde_json::json!({ "status": "FAILED" }),
            })
        });

        let mut ledger = MockTransactionLedger::new();
        ledger
            .expect_append()
            .withf(|entry| entry.status == LedgerStatus::Failed && entry.tx_hash.is_none())
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(signer, api, ledger);
        let err = orchestrator
            .cross_chain_transfer(
                transfer_request("baseSepolia", "avalancheFuji", "1.5"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AttestationFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipient_override_used_in_intent() {
        let recipient = address!("1111111111111111111111111111111111111111");

        let mut signer = MockCustodialSigner::new();
        signer
            .expect_wallet_address()
            .returning(|_| Ok(DEPOSITOR));
        signer
            .expect_sign_typed_data()
            .withf(move |_, typed| {
                typed.message.spec.destination_recipient == recipient.into_word()
                    && typed.message.spec.source_signer == DEPOSITOR.into_word()
            })
            .returning(|_, _| Ok(Bytes::from_static(&[0x51])));
        signer
            .expect_submit_contract_call()
            .returning(|_| Ok(ChallengeHandle("mint-1".to_string())));
        signer
            .expect_challenge_status()
            .returning(|_| Ok(confirmed("0xdef")));

        let mut api = MockAttestationApi::new();
        api.expect_submit_transfer().returning(|_, _| {
            Ok(SubmitResponse {
                attestation: Some(Bytes::from_static(&[0xaa])),
                signature: Some(Bytes::from_static(&[0xbb])),
                transfer_id: "t-2".to_string(),
                fees: None,
            })
        });

        let mut ledger = MockTransactionLedger::new();
        ledger.expect_append().returning(|_| Ok(()));

        let orchestrator = orchestrator(signer, api, ledger);
        let mut request = transfer_request("avalancheFuji", "arcTestnet", "3");
        request.recipient_address = Some(recipient.to_string());

        let result = orchestrator
            .cross_chain_transfer(request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.recipient, recipient);
    }
}
