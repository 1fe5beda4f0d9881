//! # Money Types
//!
//! Amounts are integers in the currency's minor unit (cents, kobo, ...).
//! Every arithmetic operation on them is checked; an overflow is reported,
//! never wrapped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies a cart can be priced in (ISO 4217)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    NGN,
    GHS,
    KES,
    ZAR,
    JPY,
}

/// Code, display prefix and minor-unit exponent
struct Denomination {
    code: &'static str,
    prefix: &'static str,
    exponent: u32,
}

impl Currency {
    pub const ALL: [Currency; 8] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::NGN,
        Currency::GHS,
        Currency::KES,
        Currency::ZAR,
        Currency::JPY,
    ];

    const fn denomination(self) -> Denomination {
        let (code, prefix, exponent) = match self {
            Currency::USD => ("USD", "$", 2),
            Currency::EUR => ("EUR", "€", 2),
            Currency::GBP => ("GBP", "£", 2),
            Currency::NGN => ("NGN", "₦", 2),
            Currency::GHS => ("GHS", "GH₵", 2),
            Currency::KES => ("KES", "KSh ", 2),
            Currency::ZAR => ("ZAR", "R", 2),
            Currency::JPY => ("JPY", "¥", 0),
        };
        Denomination {
            code,
            prefix,
            exponent,
        }
    }

    /// Upper-case ISO code, as gateways expect it
    pub fn code(self) -> &'static str {
        self.denomination().code
    }

    /// Digits after the decimal point
    pub fn exponent(self) -> u32 {
        self.denomination().exponent
    }

    /// Minor units per major unit (100 for USD, 1 for JPY)
    pub fn minor_per_major(self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|currency| currency.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unsupported currency: {}", code))
    }
}

/// An amount of money in a single currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Minor units (cents for USD)
    pub amount: i64,
    pub currency: Currency,
}

impl Price {
    /// From a major-unit decimal such as `29.99`, rounded to the minor unit
    pub fn new(major: f64, currency: Currency) -> Self {
        let scale = currency.minor_per_major() as f64;
        Self {
            amount: (major * scale).round() as i64,
            currency,
        }
    }

    /// From minor units
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::from_cents(0, currency)
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// `self × quantity`, or `None` on overflow
    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        self.amount
            .checked_mul(i64::from(quantity))
            .map(|amount| Self::from_cents(amount, self.currency))
    }

    /// `self + other`, or `None` on overflow or mixed currencies
    pub fn checked_add(&self, other: Price) -> Option<Self> {
        if self.currency != other.currency {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::from_cents(amount, self.currency))
    }

    /// Major-unit decimal, for gateways that take floats
    pub fn as_decimal(&self) -> f64 {
        self.amount as f64 / self.currency.minor_per_major() as f64
    }

    /// Human-readable form, e.g. `$89.97`
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let denomination = self.currency.denomination();
        let sign = if self.amount < 0 { "-" } else { "" };
        let minor = self.amount.unsigned_abs();

        if denomination.exponent == 0 {
            return write!(f, "{}{}{}", sign, denomination.prefix, minor);
        }

        let scale = 10_u64.pow(denomination.exponent);
        write!(
            f,
            "{}{}{}.{:0width$}",
            sign,
            denomination.prefix,
            minor / scale,
            minor % scale,
            width = denomination.exponent as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_from_major_units() {
        assert_eq!(Price::new(29.99, Currency::USD).amount, 2999);
        assert_eq!(Price::new(1000.0, Currency::JPY).amount, 1000);
        assert_eq!(Price::from_cents(2999, Currency::USD).as_decimal(), 29.99);
    }

    #[test]
    fn test_checked_times() {
        let price = Price::new(29.99, Currency::USD);
        assert_eq!(price.checked_times(3).map(|p| p.amount), Some(8997));

        let huge = Price::from_cents(i64::MAX / 2, Currency::USD);
        assert_eq!(huge.checked_times(3), None);
    }

    #[test]
    fn test_checked_add() {
        let a = Price::from_cents(150, Currency::USD);
        assert_eq!(a.checked_add(a).map(|p| p.amount), Some(300));
        assert_eq!(a.checked_add(Price::from_cents(1, Currency::EUR)), None);
        assert_eq!(
            Price::from_cents(i64::MAX, Currency::USD).checked_add(a),
            None
        );
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::new(25.0, Currency::USD).display(), "$25.00");
        assert_eq!(Price::new(19.99, Currency::EUR).display(), "€19.99");
        assert_eq!(Price::from_cents(5, Currency::NGN).display(), "₦0.05");
        assert_eq!(Price::from_cents(-250, Currency::USD).display(), "-$2.50");
        assert_eq!(Price::from_cents(1500, Currency::JPY).display(), "¥1500");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("NGN".parse::<Currency>().unwrap(), Currency::NGN);
        assert_eq!(" usd ".parse::<Currency>().unwrap(), Currency::USD);
        assert!("btc".parse::<Currency>().is_err());
        assert_eq!(Currency::KES.to_string(), "KES");
    }
}
