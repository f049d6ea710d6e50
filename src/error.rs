//! Error types for the Gateway orchestrator

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coded failure reason reported by an upstream collaborator.
///
/// Collaborators return these codes instead of free text so that the
/// orchestrator never has to pattern-match on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Not enough native token to pay for gas
    InsufficientNativeToken,
    /// Not enough of the transferred token
    InsufficientToken,
    /// Transaction was mined but reverted
    FailedOnChain,
    /// Request was cancelled or denied upstream
    Cancelled,
    /// Upstream refused the request (4xx class)
    Rejected,
    /// Upstream unreachable or failing (5xx class, transport)
    Unavailable,
    Unknown,
}

impl FailureCode {
    /// Map the custodial service's coded `errorReason` field
    pub fn from_reason_code(code: &str) -> Self {
        match code {
            "INSUFFICIENT_NATIVE_TOKEN" => FailureCode::InsufficientNativeToken,
            "INSUFFICIENT_TOKEN" => FailureCode::InsufficientToken,
            "FAILED_ON_CHAIN" => FailureCode::FailedOnChain,
            "CANCELLED" | "DENIED" => FailureCode::Cancelled,
            _ => FailureCode::Unknown,
        }
    }

    /// Map an HTTP status code returned by a collaborator
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400..=499 => FailureCode::Rejected,
            500..=599 => FailureCode::Unavailable,
            _ => FailureCode::Unknown,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCode::InsufficientNativeToken => "insufficient_native_token",
            FailureCode::InsufficientToken => "insufficient_token",
            FailureCode::FailedOnChain => "failed_on_chain",
            FailureCode::Cancelled => "cancelled",
            FailureCode::Rejected => "rejected",
            FailureCode::Unavailable => "unavailable",
            FailureCode::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// User-facing error category, derived from the typed error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidRequest,
    InsufficientGas,
    InsufficientBalance,
    UpstreamRejected,
    Unavailable,
    Timeout,
    Internal,
}

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Upstream signing error ({code}): {message}")]
    UpstreamSigning { code: FailureCode, message: String },

    #[error("Transaction {challenge_id} failed ({code}): {reason}")]
    TransactionFailed {
        challenge_id: String,
        code: FailureCode,
        reason: String,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Attestation failed: {0}")]
    AttestationFailed(String),

    #[error("Timeout waiting for {operation} after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout { .. } => true,
            GatewayError::UpstreamSigning { code, .. } => *code == FailureCode::Unavailable,
            _ => false,
        }
    }

    /// Check if error was raised before any external call was made
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GatewayError::Validation(_) | GatewayError::UnsupportedChain(_)
        )
    }

    /// Failure code carried by upstream errors
    pub fn failure_code(&self) -> Option<FailureCode> {
        match self {
            GatewayError::UpstreamSigning { code, .. }
            | GatewayError::TransactionFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classify the error for user-facing responses
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Validation(_) | GatewayError::UnsupportedChain(_) => {
                ErrorCategory::InvalidRequest
            }
            GatewayError::UpstreamSigning { code, .. }
            | GatewayError::TransactionFailed { code, .. } => match code {
                FailureCode::InsufficientNativeToken => ErrorCategory::InsufficientGas,
                FailureCode::InsufficientToken => ErrorCategory::InsufficientBalance,
                FailureCode::Unavailable => ErrorCategory::Unavailable,
                FailureCode::FailedOnChain
                | FailureCode::Cancelled
                | FailureCode::Rejected
                | FailureCode::Unknown => ErrorCategory::UpstreamRejected,
            },
            GatewayError::AttestationFailed(_) => ErrorCategory::UpstreamRejected,
            GatewayError::Network(_) => ErrorCategory::Unavailable,
            GatewayError::Timeout { .. } | GatewayError::Cancelled { .. } => {
                ErrorCategory::Timeout
            }
            GatewayError::ProtocolViolation(_)
            | GatewayError::Config(_)
            | GatewayError::Database(_)
            | GatewayError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::ProtocolViolation(format!("Malformed response body: {}", e))
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

/// Result type for orchestrator operations
pub type GatewayResult<T> = Result<T, GatewayError>;
