use std::{
    fmt,
    ops::Neg,
};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{Currency, EngineError, ResultEngine};

/// Signed money amount stored as **integer minor units** of a currency.
///
/// Balances and entry amounts are persisted in this form so that balance
/// increments inside the store are exact integer arithmetic. The public API
/// speaks `Decimal`; conversion happens at the edges.
///
/// The value is signed:
/// - positive = money in / balance increase
/// - negative = money out / balance decrease
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
/// use rust_decimal::Decimal;
///
/// let amount = Money::from_decimal(Decimal::new(1234, 2), Currency::Usd).unwrap();
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34 USD");
/// ```
///
/// Amounts with more decimals than the currency allows are rejected:
///
/// ```rust
/// use engine::{Currency, Money};
/// use rust_decimal::Decimal;
///
/// assert!(Money::from_decimal(Decimal::new(12345, 3), Currency::Usd).is_err());
/// assert!(Money::from_decimal(Decimal::new(105, 1), Currency::Jpy).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Converts an exact decimal amount, rejecting sub-minor-unit precision.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> ResultEngine<Self> {
        let units = currency.minor_units();
        if amount.normalize().scale() > units {
            return Err(EngineError::Validation(format!(
                "amount {amount} has more than {units} decimals for {currency}"
            )));
        }
        let minor = amount
            .checked_mul(Decimal::from(10_i64.pow(units)))
            .and_then(|scaled| scaled.trunc().to_i64())
            .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?;
        Ok(Self { minor, currency })
    }

    /// Converts a computed amount, rounding half away from zero to the
    /// currency's minor units.
    pub fn rounded(amount: Decimal, currency: Currency) -> ResultEngine<Self> {
        let rounded = amount
            .round_dp_with_strategy(currency.minor_units(), RoundingStrategy::MidpointAwayFromZero);
        Self::from_decimal(rounded, currency)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    #[must_use]
    pub const fn currency(self) -> Currency {
        self.currency
    }

    /// Returns the amount in major units with the currency's scale.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.minor, self.currency.minor_units())
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.minor == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.minor > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.minor < 0
    }

    /// Checked addition (returns `None` on overflow or currency mismatch).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        if self.currency != rhs.currency {
            return None;
        }
        self.minor.checked_add(rhs.minor).map(|minor| Money::new(minor, self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money::new(-self.minor, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn display_uses_currency_scale() {
        assert_eq!(Money::new(0, Currency::Usd).to_string(), "0.00 USD");
        assert_eq!(Money::new(1, Currency::Usd).to_string(), "0.01 USD");
        assert_eq!(Money::new(-1050, Currency::Eur).to_string(), "-10.50 EUR");
        assert_eq!(Money::new(1500, Currency::Jpy).to_string(), "1500 JPY");
    }

    #[test]
    fn from_decimal_accepts_trailing_zeros() {
        let money = Money::from_decimal(dec!(1505.000), Currency::Usd).unwrap();
        assert_eq!(money.minor(), 150_500);
        assert_eq!(money.to_decimal(), dec!(1505.00));
    }

    #[test]
    fn from_decimal_rejects_extra_precision() {
        assert!(Money::from_decimal(dec!(12.345), Currency::Usd).is_err());
        assert!(Money::from_decimal(dec!(0.001), Currency::Gbp).is_err());
    }

    #[test]
    fn rounded_goes_half_away_from_zero() {
        assert_eq!(Money::rounded(dec!(0.005), Currency::Usd).unwrap().minor(), 1);
        assert_eq!(Money::rounded(dec!(-0.005), Currency::Usd).unwrap().minor(), -1);
        assert_eq!(Money::rounded(dec!(1504.996), Currency::Usd).unwrap().minor(), 150_500);
    }

    #[test]
    fn checked_add_refuses_mixed_currencies() {
        let usd = Money::new(100, Currency::Usd);
        let eur = Money::new(100, Currency::Eur);
        assert!(usd.checked_add(eur).is_none());
        assert_eq!(usd.checked_add(usd).unwrap().minor(), 200);
    }
}
