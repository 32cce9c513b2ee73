use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code of an account and of the entries posted against it.
///
/// The ledger never converts between currencies: an entry is always stored in
/// the currency of the account it belongs to.
///
/// ## Minor units
///
/// Amounts are persisted as an `i64` number of **minor units** (see `Money`).
/// `minor_units()` returns how many decimal digits separate:
/// - major units (human input/output, e.g. `10.50 USD`)
/// - minor units (stored integers, e.g. `1050`)
///
/// Example: USD has 2 minor units, so `10.50 USD` ⇄ `1050`; JPY has none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Jpy => "JPY",
        }
    }

    /// Number of fraction digits used when converting amounts.
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Currency::Jpy => 0,
            Currency::Usd | Currency::Eur | Currency::Gbp | Currency::Cad | Currency::Aud => 2,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            "JPY" => Ok(Currency::Jpy),
            other => Err(EngineError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(Currency::try_from("usd").unwrap(), Currency::Usd);
        assert_eq!(Currency::try_from(" GBP ").unwrap(), Currency::Gbp);
        assert!(Currency::try_from("XXX").is_err());
    }

    #[test]
    fn yen_has_no_minor_units() {
        assert_eq!(Currency::Jpy.minor_units(), 0);
        assert_eq!(Currency::Usd.minor_units(), 2);
    }
}
