//! Money Module
//!
//! Every monetary value in the system is an exact `rust_decimal::Decimal` with at
//! most [`CURRENCY_DECIMALS`] fractional digits. Client input goes through
//! [`parse_amount`] / [`Amount::try_from`]; there is no floating point anywhere.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: no silent truncation or rounding
//! 2. Type Safety: a transfer value is an [`Amount`], which is always positive
//!
//! ## Usage
//! ```rust
//! use pix_transfer::money::{parse_amount, Amount};
//!
//! let amount = parse_amount("40.00").unwrap();
//! assert_eq!(amount.to_string(), "40.00");
//!
//! assert!(parse_amount("-1").is_err());
//! assert!(parse_amount("0.001").is_err()); // sub-cent
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fractional digits of the settlement currency (BRL cents)
pub const CURRENCY_DECIMALS: u32 = 2;

/// Largest value a NUMERIC(18,2) column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, 2); // 999_999_999_999_999_999 * 10^-2

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Amount exceeds maximum of 9999999999999999.99")]
    TooLarge,
}

// ============================================================================
// Amount: validated, strictly positive transfer value
// ============================================================================

/// A strictly positive monetary value with at most two fractional digits.
///
/// Fields are private to force validation through `TryFrom<Decimal>` or
/// [`parse_amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Get the inner Decimal value
    #[inline]
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MoneyError;

    fn try_from(decimal: Decimal) -> Result<Self, Self::Error> {
        if decimal.is_sign_negative() || decimal.is_zero() {
            return Err(MoneyError::InvalidAmount);
        }

        let normalized = decimal.normalize();
        if normalized.scale() > CURRENCY_DECIMALS {
            return Err(MoneyError::PrecisionOverflow {
                provided: normalized.scale(),
                max: CURRENCY_DECIMALS,
            });
        }

        if normalized > MAX_AMOUNT {
            return Err(MoneyError::TooLarge);
        }

        let mut value = normalized;
        value.rescale(CURRENCY_DECIMALS);
        Ok(Self(value))
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_amount(self.0))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // String keeps precision across JSON consumers
        serializer.serialize_str(&format_amount(self.0))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        // Support both JSON number and JSON string
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => parse_amount(&s).map_err(D::Error::custom),
            DecimalOrString::Number(d) => Amount::try_from(d).map_err(D::Error::custom),
        }
    }
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Convert a client string amount to a validated [`Amount`]
///
/// # Errors
/// * `InvalidFormat` - empty input, signs, `.5`/`5.` forms, non-digits
/// * `PrecisionOverflow` - more than two fractional digits
/// * `InvalidAmount` - zero
/// * `TooLarge` - above [`MAX_AMOUNT`]
pub fn parse_amount(amount_str: &str) -> Result<Amount, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') {
        return Err(MoneyError::InvalidAmount);
    }
    if amount_str.starts_with('+') {
        return Err(MoneyError::InvalidFormat("explicit sign not allowed".into()));
    }

    let (whole, frac) = match amount_str.split_once('.') {
        None => (amount_str, ""),
        Some((whole, frac)) => {
            if whole.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if frac.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (whole, frac)
        }
    };

    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            amount_str
        )));
    }

    // REJECT if too many decimals (no silent truncation!)
    let significant_frac = frac.trim_end_matches('0');
    if significant_frac.len() > CURRENCY_DECIMALS as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: CURRENCY_DECIMALS,
        });
    }

    let decimal = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(format!("invalid decimal: {}", e)))?;

    Amount::try_from(decimal)
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Format a balance or amount with exactly two fractional digits
pub fn format_amount(value: Decimal) -> String {
    format!("{:.prec$}", value, prec = CURRENCY_DECIMALS as usize)
}
