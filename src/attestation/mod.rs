//! Attestation authority interaction
//!
//! Signed burn intents are submitted to the attestation authority, which
//! answers with an attestation plus counter-signature, either immediately or
//! after a polling phase keyed by the transfer id.

pub mod client;

pub use client::GatewayApiClient;

use crate::encoding::BurnIntentMessage;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::poller::PollConfig;
use crate::signer::Signature;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal failure status reported by the authority
pub const STATUS_FAILED: &str = "FAILED";

/// Response to a burn intent submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResponse {
    pub attestation: Option<Bytes>,
    pub signature: Option<Bytes>,
    pub transfer_id: String,
    pub fees: Option<serde_json::Value>,
}

/// One observation of a submitted transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStatus {
    /// `status`, falling back to `state`
    pub status: Option<String>,
    pub attestation: Option<Bytes>,
    pub signature: Option<Bytes>,
    /// Full response body, kept for failure detail
    pub detail: serde_json::Value,
}

/// Attestation and counter-signature authorizing a mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationRecord {
    pub attestation: Bytes,
    pub signature: Bytes,
    pub transfer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSource {
    pub domain: u32,
    pub depositor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesRequest {
    pub token: String,
    pub sources: Vec<BalanceSource>,
}

/// Available balance at one domain, as a decimal string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBalance {
    pub domain: u32,
    #[serde(default)]
    pub depositor: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub balances: Vec<DomainBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub address: String,
    #[serde(default)]
    pub supported_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfo {
    pub chain: String,
    pub network: String,
    pub domain: u32,
    pub wallet_contract: Option<ContractInfo>,
    pub minter_contract: Option<ContractInfo>,
    pub processed_height: Option<String>,
    pub burn_intent_expiration_height: Option<String>,
}

/// Protocol version and per-domain contract metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub version: u32,
    #[serde(default)]
    pub domains: Vec<DomainInfo>,
}

/// Attestation authority REST API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttestationApi: Send + Sync {
    /// `POST /v1/transfer`
    async fn submit_transfer(
        &self,
        burn_intent: &BurnIntentMessage,
        signature: &Signature,
    ) -> GatewayResult<SubmitResponse>;

    /// `GET /v1/transfers/{id}`
    async fn transfer_status(&self, transfer_id: &str) -> GatewayResult<TransferStatus>;

    /// `POST /v1/balances`
    async fn balances(&self, request: &BalancesRequest) -> GatewayResult<BalancesResponse>;

    /// `GET /v1/info`
    async fn info(&self) -> GatewayResult<GatewayInfo>;
}

/// Submits burn intents and waits for their attestation
pub struct AttestationClient {
    api: Arc<dyn AttestationApi>,
}

impl AttestationClient {
    pub fn new(api: Arc<dyn AttestationApi>) -> Self {
        Self { api }
    }

    pub async fn submit_burn_intent(
        &self,
        burn_intent: &BurnIntentMessage,
        signature: &Signature,
    ) -> GatewayResult<SubmitResponse> {
        let response = self.api.submit_transfer(burn_intent, signature).await?;
        info!(
            transfer_id = %response.transfer_id,
            attested = response.attestation.is_some() && response.signature.is_some(),
            "Burn intent submitted"
        );
        Ok(response)
    }

    /// Poll the transfer until both attestation and signature are present.
    ///
    /// Each check waits `interval` first. A `FAILED` status aborts with the
    /// full response as detail.
    pub async fn await_attestation(
        &self,
        transfer_id: &str,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<AttestationRecord> {
        let operation = format!("attestation of transfer {}", transfer_id);

        for attempt in 1..=config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(transfer_id, "Stopped waiting for attestation");
                    return Err(GatewayError::Cancelled { operation });
                }
                _ = tokio::time::sleep(config.interval) => {}
            }

            metrics::record_poll_tick("attestation");
            let status = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(GatewayError::Cancelled { operation });
                }
                status = self.api.transfer_status(transfer_id) => status?,
            };

            debug!(
                transfer_id,
                status = status.status.as_deref().unwrap_or("UNKNOWN"),
                "Transfer status (attempt {}/{})",
                attempt,
                config.max_attempts
            );

            if let (Some(attestation), Some(signature)) = (status.attestation, status.signature) {
                info!(transfer_id, "Attestation received");
                return Ok(AttestationRecord {
                    attestation,
                    signature,
                    transfer_id: transfer_id.to_string(),
                });
            }

            if status.status.as_deref() == Some(STATUS_FAILED) {
                return Err(GatewayError::AttestationFailed(format!(
                    "Transfer {} failed: {}",
                    transfer_id, status.detail
                )));
            }
        }

        metrics::record_poll_timeout("attestation");
        Err(GatewayError::Timeout {
            operation,
            attempts: config.max_attempts,
        })
    }

    /// Submit and, if the submission was not attested inline, poll for it
    pub async fn attest(
        &self,
        burn_intent: &BurnIntentMessage,
        signature: &Signature,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<AttestationRecord> {
        let submitted = self.submit_burn_intent(burn_intent, signature).await?;

        match (submitted.attestation, submitted.signature) {
            (Some(attestation), Some(signature)) => Ok(AttestationRecord {
                attestation,
                signature,
                transfer_id: submitted.transfer_id,
            }),
            _ => {
                self.await_attestation(&submitted.transfer_id, config, cancel)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn message() -> BurnIntentMessage {
        crate::encoding::tests::sample_message()
    }

    fn pending(status: &str) -> TransferStatus {
        TransferStatus {
            status: Some(status.to_string()),
            attestation: None,
            signature: None,
            detail: serde_json::json!({ "status": status }),
        }
    }

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig::new(Duration::from_secs(3), max_attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_attestation_skips_polling() {
        let mut api = MockAttestationApi::new();
        api.expect_submit_transfer().times(1).returning(|_, _| {
            Ok(SubmitResponse {
                attestation: Some(Bytes::from_static(&[0xaa])),
                signature: Some(Bytes::from_static(&[0xbb])),
                transfer_id: "t-1".to_string(),
                fees: None,
            })
        });
        api.expect_transfer_status().times(0);

        let client = AttestationClient::new(Arc::new(api));
        let record = client
            .attest(&message(), &Bytes::from_static(&[1]), &config(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(record.attestation, Bytes::from_static(&[0xaa]));
        assert_eq!(record.transfer_id, "t-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_attested() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut api = MockAttestationApi::new();
        api.expect_transfer_status().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(pending("PENDING"))
            } else {
                Ok(TransferStatus {
                    status: Some("CONFIRMED".to_string()),
                    attestation: Some(Bytes::from_static(&[0xaa])),
                    signature: Some(Bytes::from_static(&[0xbb])),
                    detail: serde_json::Value::Null,
                })
            }
        });

        let client = AttestationClient::new(Arc::new(api));
        let record = client
            .await_attestation("t-1", &config(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(record.signature, Bytes::from_static(&[0xbb]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_raises_with_detail() {
        let mut api = MockAttestationApi::new();
        api.expect_transfer_status()
            .times(1)
            .returning(|_| Ok(pending("FAILED")));

        let client = AttestationClient::new(Arc::new(api));
        let err = client
            .await_attestation("t-1", &config(10), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            GatewayError::AttestationFailed(detail) => assert!(detail.contains("FAILED")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let mut api = MockAttestationApi::new();
        api.expect_transfer_status()
            .times(4)
            .returning(|_| Ok(pending("PENDING")));

        let client = AttestationClient::new(Arc::new(api));
        let err = client
            .await_attestation("t-1", &config(4), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_poll() {
        let mut api = MockAttestationApi::new();
        api.expect_transfer_status().times(0);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = AttestationClient::new(Arc::new(api));
        let err = client
            .await_attestation("t-1", &config(4), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Cancelled { .. }));
    }
}
