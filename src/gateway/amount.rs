use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Currency labels the gateway can bill. The gateway itself only accepts rials,
/// everything else is scaled into rials before a transaction is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Rial,
    Toman,
    /// Unofficial "hezar rial" code, a thousand rials
    HezarRial,
    /// Unofficial "hezar toman" code, a thousand tomans
    HezarToman,
}

impl Currency {
    /// Case-insensitive lookup of a store currency code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "irr" | "rial" => Some(Self::Rial),
            "تومان ایران" | "تومان" | "irt" | "iranian_toman" | "iran_toman" | "iranian-toman"
            | "iran-toman" | "toman" | "iran toman" | "iranian toman" => Some(Self::Toman),
            "irhr" => Some(Self::HezarRial),
            "irht" => Some(Self::HezarToman),
            _ => None,
        }
    }

    pub fn rial_multiplier(self) -> u64 {
        match self {
            Self::Rial => 1,
            Self::Toman => 10,
            Self::HezarRial => 1_000,
            Self::HezarToman => 10_000,
        }
    }
}

/// Converts an order total into the integer rial amount the gateway bills.
///
/// The fractional part of the total is dropped before scaling. Returns `0` for
/// unrecognized currencies, negative totals and totals that do not fit, callers
/// treat `0` as "currency not supported".
pub fn normalize(amount: Decimal, currency: &str) -> u64 {
    let Some(currency) = Currency::from_code(currency) else {
        return 0;
    };
    amount
        .trunc()
        .to_u64()
        .and_then(|amount| amount.checked_mul(currency.rial_multiplier()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{Currency, normalize};

    #[test]
    fn scales_every_known_alias() {
        let cases = [
            ("IRR", 100),
            ("RIAL", 100),
            ("IRT", 1_000),
            ("TOMAN", 1_000),
            ("Iranian_TOMAN", 1_000),
            ("Iran_TOMAN", 1_000),
            ("Iranian-TOMAN", 1_000),
            ("Iran-TOMAN", 1_000),
            ("Iran TOMAN", 1_000),
            ("Iranian TOMAN", 1_000),
            ("تومان", 1_000),
            ("تومان ایران", 1_000),
            ("IRHR", 100_000),
            ("IRHT", 1_000_000),
        ];
        for (code, expected) in cases {
            assert_eq!(normalize(dec!(100), code), expected, "currency {code}");
        }
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(normalize(dec!(100), "toman"), normalize(dec!(100), "TOMAN"));
        assert_eq!(normalize(dec!(100), "iRhT"), 1_000_000);
        assert_eq!(Currency::from_code("rIaL"), Some(Currency::Rial));
    }

    #[test]
    fn unknown_currency_is_zero() {
        for code in ["USD", "usd", "EUR", "", "TOMANS", " irr"] {
            assert_eq!(normalize(dec!(100), code), 0, "currency {code:?}");
        }
    }

    #[test]
    fn fraction_is_truncated() {
        assert_eq!(normalize(dec!(100.99), "IRT"), 1_000);
        assert_eq!(normalize(dec!(100000), "IRT"), 1_000_000);
    }

    #[test]
    fn negative_and_overflowing_totals_are_rejected() {
        assert_eq!(normalize(dec!(-5), "IRR"), 0);
        assert_eq!(normalize(Decimal::MAX, "IRHT"), 0);
    }
}
