//! HTTP client for Circle developer-controlled wallets

use super::{
    CallTarget, ChallengeHandle, ChallengeState, ChallengeStatus, ContractCall, CustodialSigner,
    Signature,
};
use crate::config::CustodialConfig;
use crate::encoding::TypedData;
use crate::error::{FailureCode, GatewayError, GatewayResult};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

/// Custodial signer backed by the Circle Web3 Services API
pub struct CircleSignerClient {
    client: Client,
    base_url: String,
    api_key: String,
    entity_secret_ciphertext: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractExecutionRequest<'a> {
    idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blockchain: Option<&'a str>,
    contract_address: String,
    abi_function_signature: &'a str,
    abi_parameters: &'a [String],
    fee_level: super::FeeLevel,
    entity_secret_ciphertext: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignTypedDataRequest<'a> {
    wallet_id: &'a str,
    data: String,
    entity_secret_ciphertext: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ChallengeData {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignatureData {
    signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    transaction: Option<TransactionRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
    state: Option<String>,
    tx_hash: Option<String>,
    error_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletData {
    wallet: Option<WalletRecord>,
}

#[derive(Debug, Deserialize)]
struct WalletRecord {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

impl CircleSignerClient {
    pub fn new(config: &CustodialConfig, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            entity_secret_ciphertext: config.entity_secret_ciphertext.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

#[async_trait]
impl CustodialSigner for CircleSignerClient {
    async fn submit_contract_call(&self, call: ContractCall) -> GatewayResult<ChallengeHandle> {
        let (wallet_id, wallet_address, blockchain) = match &call.target {
            CallTarget::WalletId(id) => (Some(id.as_str()), None, None),
            CallTarget::WalletAddress {
                address,
                blockchain,
            } => (None, Some(address.to_string()), Some(blockchain.as_str())),
        };

        let request = ContractExecutionRequest {
            idempotency_key: Uuid::new_v4().to_string(),
            wallet_id,
            wallet_address,
            blockchain,
            contract_address: call.contract_address.to_string(),
            abi_function_signature: &call.function_signature,
            abi_parameters: &call.args,
            fee_level: call.fee_level,
            entity_secret_ciphertext: &self.entity_secret_ciphertext,
        };

        debug!(
            "Submitting {} on {}",
            call.function_signature, call.contract_address
        );
        let envelope: Envelope<ChallengeData> = self
            .post("/v1/w3s/developer/transactions/contractExecution", &request)
            .await?;

        challenge_from(envelope)
    }

    async fn sign_typed_data(
        &self,
        wallet_id: &str,
        typed_data: &TypedData,
    ) -> GatewayResult<Signature> {
        let request = SignTypedDataRequest {
            wallet_id,
            data: typed_data.to_json()?,
            entity_secret_ciphertext: &self.entity_secret_ciphertext,
        };

        let envelope: Envelope<SignatureData> = self
            .post("/v1/w3s/developer/sign/typedData", &request)
            .await?;

        signature_from(envelope)
    }

    async fn challenge_status(&self, handle: &ChallengeHandle) -> GatewayResult<ChallengeStatus> {
        let envelope: Envelope<TransactionData> = self
            .get(&format!("/v1/w3s/transactions/{}", handle))
            .await?;
        status_from(envelope)
    }

    async fn wallet_address(&self, wallet_id: &str) -> GatewayResult<Address> {
        let envelope: Envelope<WalletData> =
            self.get(&format!("/v1/w3s/wallets/{}", wallet_id)).await?;
        address_from(envelope, wallet_id)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::UpstreamSigning {
        code: FailureCode::Unavailable,
        message: e.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| {
                b.message
                    .map(|m| format!("{} (code {})", m, b.code.unwrap_or_default()))
            })
            .unwrap_or(body);
        error!("Custodial API error {}: {}", status, message);
        return Err(GatewayError::UpstreamSigning {
            code: FailureCode::from_http_status(status.as_u16()),
            message: format!("{}: {}", status, message),
        });
    }

    response.json::<T>().await.map_err(GatewayError::from)
}

fn missing(what: &str) -> GatewayError {
    GatewayError::UpstreamSigning {
        code: FailureCode::Unknown,
        message: format!("Custodial API response is missing {}", what),
    }
}

fn challenge_from(envelope: Envelope<ChallengeData>) -> GatewayResult<ChallengeHandle> {
    envelope
        .data
        .and_then(|d| d.id)
        .filter(|id| !id.is_empty())
        .map(ChallengeHandle)
        .ok_or_else(|| missing("a challenge id"))
}

fn signature_from(envelope: Envelope<SignatureData>) -> GatewayResult<Signature> {
    let signature = envelope
        .data
        .and_then(|d| d.signature)
        .ok_or_else(|| missing("a signature"))?;
    Bytes::from_str(&signature).map_err(|e| {
        GatewayError::ProtocolViolation(format!("Signature is not hex encoded: {}", e))
    })
}

fn status_from(envelope: Envelope<TransactionData>) -> GatewayResult<ChallengeStatus> {
    let tx = envelope
        .data
        .and_then(|d| d.transaction)
        .ok_or_else(|| missing("the transaction"))?;

    Ok(ChallengeStatus {
        state: ChallengeState::parse(tx.state.as_deref().unwrap_or("UNKNOWN")),
        tx_hash: tx.tx_hash,
        error_reason: tx.error_reason,
    })
}

fn address_from(envelope: Envelope<WalletData>, wallet_id: &str) -> GatewayResult<Address> {
    let address = envelope
        .data
        .and_then(|d| d.wallet)
        .and_then(|w| w.address)
        .ok_or_else(|| missing(&format!("the address of wallet {}", wallet_id)))?;
    Address::from_str(&address).map_err(|e| {
        GatewayError::ProtocolViolation(format!("Invalid wallet address {}: {}", address, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: DeserializeOwned>(json: &str) -> Envelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_challenge_id() {
        let handle = challenge_from(parse(r#"{"data":{"id":"c-123","state":"INITIATED"}}"#)).unwrap();
        assert_eq!(handle.as_str(), "c-123");

        let err = challenge_from(parse(r#"{"data":{}}"#)).unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamSigning { .. }));
    }

    #[test]
    fn test_transaction_status() {
        let status = status_from(parse(
            r#"{"data":{"transaction":{"id":"c-1","state":"COMPLETE","txHash":"0xabc"}}}"#,
        ))
        .unwrap();
        assert_eq!(status.state, ChallengeState::Complete);
        assert_eq!(status.tx_hash.as_deref(), Some("0xabc"));

        let status = status_from(parse(
            r#"{"data":{"transaction":{"state":"FAILED","errorReason":"INSUFFICIENT_TOKEN"}}}"#,
        ))
        .unwrap();
        assert_eq!(status.state, ChallengeState::Failed("FAILED".to_string()));
        assert_eq!(status.error_reason.as_deref(), Some("INSUFFICIENT_TOKEN"));
    }

    #[test]
    fn test_signature() {
        let sig = signature_from(parse(r#"{"data":{"signature":"0xdeadbeef"}}"#)).unwrap();
        assert_eq!(sig.to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(signature_from(parse(r#"{"data":null}"#)).is_err());
    }

    #[test]
    fn test_wallet_address() {
        let addr = address_from(
            parse(r#"{"data":{"wallet":{"address":"0x036cbd53842c5426634e7929541ec2318f3dcf7e"}}}"#),
            "w-1",
        )
        .unwrap();
        assert_eq!(
            addr,
            alloy_primitives::address!("036CbD53842c5426634e7929541eC2318f3dCF7e")
        );
        assert!(address_from(parse(r#"{"data":{"wallet":{}}}"#), "w-1").is_err());
    }

    #[test]
    fn test_contract_execution_body() {
        let args = vec!["0x01".to_string(), "100".to_string()];
        let request = ContractExecutionRequest {
            idempotency_key: "k".to_string(),
            wallet_id: None,
            wallet_address: Some("0xabc".to_string()),
            blockchain: Some("BASE-SEPOLIA"),
            contract_address: "0xdef".to_string(),
            abi_function_signature: "gatewayMint(bytes,bytes)",
            abi_parameters: &args,
            fee_level: super::super::FeeLevel::Medium,
            entity_secret_ciphertext: "cipher",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("walletId").is_none());
        assert_eq!(json["blockchain"], "BASE-SEPOLIA");
        assert_eq!(json["abiFunctionSignature"], "gatewayMint(bytes,bytes)");
        assert_eq!(json["feeLevel"], "MEDIUM");
        assert_eq!(json["abiParameters"][1], "100");
    }
}
