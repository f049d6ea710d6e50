//! Bounded polling of custodial challenges until they reach a terminal state

use crate::error::{FailureCode, GatewayError, GatewayResult};
use crate::metrics;
use crate::signer::{ChallengeHandle, ChallengeState, CustodialSigner};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval and attempt bound for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Polls the custodial signer until a challenge confirms or fails
pub struct ConfirmationPoller {
    signer: Arc<dyn CustodialSigner>,
}

impl ConfirmationPoller {
    pub fn new(signer: Arc<dyn CustodialSigner>) -> Self {
        Self { signer }
    }

    /// Wait for `handle` to confirm and return its transaction hash.
    ///
    /// The first status check happens immediately; each later check waits
    /// `interval`. Gives up after `max_attempts` checks.
    pub async fn await_confirmation(
        &self,
        handle: &ChallengeHandle,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> GatewayResult<String> {
        let operation = format!("confirmation of {}", handle);

        for attempt in 1..=config.max_attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!("Stopped polling {} after {} attempts", handle, attempt - 1);
                        return Err(GatewayError::Cancelled { operation });
                    }
                    _ = tokio::time::sleep(config.interval) => {}
                }
            }

            metrics::record_poll_tick("confirmation");
            let status = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(GatewayError::Cancelled { operation });
                }
                status = self.signer.challenge_status(handle) => status?,
            };

            match status.state {
                ChallengeState::Confirmed | ChallengeState::Complete => {
                    return match status.tx_hash.filter(|h| !h.is_empty()) {
                        Some(hash) => {
                            info!("Challenge {} confirmed: {}", handle, hash);
                            Ok(hash)
                        }
                        None => Err(GatewayError::ProtocolViolation(format!(
                            "Challenge {} reported {:?} without a transaction hash",
                            handle, status.state
                        ))),
                    };
                }
                ChallengeState::Failed(ref state) => {
                    // Cancelled or denied challenges usually carry no reason code
                    let reason = status
                        .error_reason
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| state.clone());
                    let code = FailureCode::from_reason_code(&reason);
                    warn!("Challenge {} failed: {} ({})", handle, reason, code);
                    return Err(GatewayError::TransactionFailed {
                        challenge_id: handle.to_string(),
                        code,
                        reason,
                    });
                }
                ChallengeState::Submitted(ref state) => {
                    debug!(
                        "Challenge {} is {} (attempt {}/{})",
                        handle, state, attempt, config.max_attempts
                    );
                }
            }
        }

        metrics::record_poll_timeout("confirmation");
        Err(GatewayError::Timeout {
            operation,
            attempts: config.max_attempts,
        })
    }
}
