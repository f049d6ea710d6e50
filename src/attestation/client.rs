//! reqwest client for the attestation authority REST API

use super::{
    AttestationApi, BalancesRequest, BalancesResponse, GatewayInfo, SubmitResponse,
    TransferStatus,
};
use crate::config::GatewayConfig;
use crate::encoding::BurnIntentMessage;
use crate::error::{GatewayError, GatewayResult};
use crate::signer::Signature;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

/// HTTP client for the Gateway attestation authority
pub struct GatewayApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedBurnIntent<'a> {
    burn_intent: &'a BurnIntentMessage,
    signature: &'a Signature,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRecord {
    attestation: Option<String>,
    signature: Option<String>,
    transfer_id: Option<String>,
    fees: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StatusRecord {
    status: Option<String>,
    state: Option<String>,
    attestation: Option<String>,
    signature: Option<String>,
}

impl GatewayApiClient {
    pub fn new(config: &GatewayConfig, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AttestationApi for GatewayApiClient {
    async fn submit_transfer(
        &self,
        burn_intent: &BurnIntentMessage,
        signature: &Signature,
    ) -> GatewayResult<SubmitResponse> {
        let payload = [SignedBurnIntent {
            burn_intent,
            signature,
        }];

        debug!("Submitting burn intent to {}", self.url("/v1/transfer"));
        let response = self
            .client
            .post(self.url("/v1/transfer"))
            .json(&payload)
            .send()
            .await?;

        parse_submit(checked(response).await?.json().await?)
    }

    async fn transfer_status(&self, transfer_id: &str) -> GatewayResult<TransferStatus> {
        let response = self
            .client
            .get(self.url(&format!("/v1/transfers/{}", transfer_id)))
            .send()
            .await?;

        parse_status(checked(response).await?.json().await?)
    }

    async fn balances(&self, request: &BalancesRequest) -> GatewayResult<BalancesResponse> {
        let response = self
            .client
            .post(self.url("/v1/balances"))
            .json(request)
            .send()
            .await?;

        Ok(checked(response).await?.json().await?)
    }

    async fn info(&self) -> GatewayResult<GatewayInfo> {
        let response = self.client.get(self.url("/v1/info")).send().await?;
        Ok(checked(response).await?.json().await?)
    }
}

/// Classify non-2xx responses: 4xx is a rejection, anything else is transient
async fn checked(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("Gateway API error: {} - {}", status, body);
    if status.is_client_error() {
        Err(GatewayError::AttestationFailed(format!(
            "Gateway API error: {} - {}",
            status, body
        )))
    } else {
        Err(GatewayError::Network(format!(
            "Gateway API error: {} - {}",
            status, body
        )))
    }
}

fn hex_field(value: Option<String>, field: &str) -> GatewayResult<Option<Bytes>> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => Bytes::from_str(&v).map(Some).map_err(|e| {
            GatewayError::ProtocolViolation(format!("Malformed {} {:?}: {}", field, v, e))
        }),
    }
}

fn parse_submit(body: Value) -> GatewayResult<SubmitResponse> {
    let first = match body {
        Value::Array(items) => items.into_iter().next().ok_or_else(|| {
            GatewayError::ProtocolViolation("Empty transfer submission response".to_string())
        })?,
        other => other,
    };

    let record: SubmitRecord = serde_json::from_value(first).map_err(|e| {
        GatewayError::ProtocolViolation(format!("Malformed transfer submission response: {}", e))
    })?;

    let transfer_id = record.transfer_id.filter(|id| !id.is_empty()).ok_or_else(|| {
        GatewayError::ProtocolViolation("Transfer submission response has no transferId".to_string())
    })?;

    Ok(SubmitResponse {
        attestation: hex_field(record.attestation, "attestation")?,
        signature: hex_field(record.signature, "signature")?,
        transfer_id,
        fees: record.fees,
    })
}

fn parse_status(body: Value) -> GatewayResult<TransferStatus> {
    let record: StatusRecord = serde_json::from_value(body.clone()).map_err(|e| {
        GatewayError::ProtocolViolation(format!("Malformed transfer status: {}", e))
    })?;

    Ok(TransferStatus {
        status: record.status.or(record.state),
        attestation: hex_field(record.attestation, "attestation")?,
        signature: hex_field(record.signature, "signature")?,
        detail: body,
    })
}
