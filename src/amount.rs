//! Fixed-point conversion between decimal token amounts and atomic units
//!
//! USDC carries 6 decimals. Amounts are parsed from their decimal text
//! representation without going through floating point; digits beyond the
//! 6th decimal place are truncated toward zero.

use crate::error::{GatewayError, GatewayResult};

use alloy_primitives::U256;

/// Decimals of the transferred token
pub const TOKEN_DECIMALS: usize = 6;

/// 10^TOKEN_DECIMALS
pub const ATOMIC_SCALE: u64 = 1_000_000;

/// Default ceiling in whole units for user-supplied amounts
pub const DEFAULT_MAX_WHOLE_UNITS: u64 = 1_000_000_000;

/// Converts user-facing amounts into atomic units and enforces bounds
#[derive(Debug, Clone, Copy)]
pub struct AmountConverter {
    max_whole_units: u64,
}

impl Default for AmountConverter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WHOLE_UNITS)
    }
}

impl AmountConverter {
    pub fn new(max_whole_units: u64) -> Self {
        Self { max_whole_units }
    }

    /// Convert a decimal amount to atomic units.
    ///
    /// Rejects malformed input, amounts that are zero after truncation to
    /// the token scale, and amounts above the configured ceiling.
    pub fn to_atomic_units(&self, amount: &str) -> GatewayResult<U256> {
        let atomic = parse_units(amount)?;

        if atomic.is_zero() {
            return Err(GatewayError::Validation(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let ceiling = U256::from(self.max_whole_units) * U256::from(ATOMIC_SCALE);
        if atomic > ceiling {
            return Err(GatewayError::Validation(format!(
                "Amount exceeds maximum allowed value of {}",
                self.max_whole_units
            )));
        }

        Ok(atomic)
    }
}

/// Parse a non-negative decimal string into atomic units, truncating
/// digits past the token scale.
pub fn parse_units(amount: &str) -> GatewayResult<U256> {
    let amount = amount.trim();
    if amount.starts_with('-') {
        return Err(GatewayError::Validation(
            "Amount must be greater than 0".to_string(),
        ));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(GatewayError::Validation(format!(
            "Invalid amount: {:?}",
            amount
        )));
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)
            .map_err(|_| GatewayError::Validation(format!("Amount out of range: {}", amount)))?
    };

    let mut fraction: String = fraction.chars().take(TOKEN_DECIMALS).collect();
    while fraction.len() < TOKEN_DECIMALS {
        fraction.push('0');
    }
    let fraction = U256::from_str_radix(&fraction, 10)
        .map_err(|_| GatewayError::Validation(format!("Invalid amount: {:?}", amount)))?;

    whole
        .checked_mul(U256::from(ATOMIC_SCALE))
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| GatewayError::Validation(format!("Amount out of range: {}", amount)))
}

/// Format atomic units as a decimal string with full token precision
pub fn format_units(atomic: U256) -> String {
    let scale = U256::from(ATOMIC_SCALE);
    let whole = atomic / scale;
    let fraction = atomic % scale;
    format!(
        "{}.{:0width$}",
        whole,
        fraction.to::<u64>(),
        width = TOKEN_DECIMALS
    )
}
