//! Monetary amounts using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the shop's currency.
///
/// The backend reports amounts as JSON numbers or decimal strings; both
/// deserialize into an exact [`Decimal`]. Amounts are serialized as strings
/// so cached values survive a round trip without float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero, the value shown when a metric is unavailable.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from minor units (e.g. cents).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Money = serde_json::from_str("1234.5").unwrap();
        let from_string: Money = serde_json::from_str("\"1234.50\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number.to_string(), "1234.50");
    }

    #[test]
    fn test_display_rounds_to_cents() {
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
    }
}
