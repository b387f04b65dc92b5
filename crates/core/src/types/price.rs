//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts are kept in the currency's standard unit (dollars, rupees) as a
/// `Decimal`; payment providers want minor units, see [`Price::minor_units`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Amount in the smallest currency unit (cents, paise), rounded half-up.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    INR,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }

    /// Lowercase code, the form payment providers expect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::INR => "inr",
        }
    }
}

/// Error returned for an unsupported currency code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            "gbp" => Ok(Self::GBP),
            "inr" => Ok(Self::INR),
            other => Err(UnknownCurrency(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_display_pads_to_two_places() {
        assert_eq!(Price::new(dec("12"), CurrencyCode::USD).to_string(), "$12.00");
        assert_eq!(Price::new(dec("12.5"), CurrencyCode::USD).to_string(), "$12.50");
        assert_eq!(Price::new(dec("0.99"), CurrencyCode::GBP).to_string(), "£0.99");
        assert_eq!(Price::new(dec("3.456"), CurrencyCode::INR).to_string(), "₹3.46");
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Price::new(dec("19.99"), CurrencyCode::USD).minor_units(), Some(1999));
        assert_eq!(Price::new(dec("5"), CurrencyCode::USD).minor_units(), Some(500));
        assert_eq!(Price::new(dec("0.005"), CurrencyCode::USD).minor_units(), Some(1));
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("INR".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert_eq!(" usd ".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("doubloons".parse::<CurrencyCode>().is_err());
    }
}
