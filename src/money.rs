// Money value type
//
// Fixed two-decimal amounts backed by rust_decimal. Text input follows the
// currency mask used by price fields: every digit typed is read as cents.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Fractional digits carried by every Money value
pub const MONEY_SCALE: u32 = 2;

/// Longest digit run `parse` accepts; Decimal holds 28 significant digits
const MAX_PARSE_DIGITS: usize = 28;

/// Locale currency convention used when rendering Money as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl CurrencyFormat {
    /// Brazilian real, e.g. `R$ 1.234,56`
    pub fn brl() -> Self {
        Self {
            symbol: "R$".to_string(),
            thousands_separator: '.',
            decimal_separator: ',',
        }
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self::brl()
    }
}

/// Monetary amount with exactly two fractional digits
///
/// Arithmetic is exact decimal arithmetic; anything that can produce more than
/// two fractional digits (scalar multiplication, percentages) is rounded half
/// away from zero back to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build from an integer number of cents
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_SCALE))
    }

    /// Build from an arbitrary decimal, rounding to cents
    pub fn from_decimal(amount: Decimal) -> Self {
        Money(amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// The amount as a decimal
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount in cents
    pub fn cents(&self) -> i128 {
        let mut scaled = self.0;
        scaled.rescale(MONEY_SCALE);
        scaled.mantissa()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse human-entered currency text
    ///
    /// Everything except digits is discarded and the remaining digits are read
    /// as cents, so `"R$ 1.234,56"`, `"1234,56"` and `"123456"` all yield
    /// 1234.56. Empty, digit-less or oversized input yields zero; this never
    /// fails.
    pub fn parse(text: &str) -> Money {
        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        let digits = digits.trim_start_matches('0');

        if digits.is_empty() {
            return Money::ZERO;
        }
        if digits.len() > MAX_PARSE_DIGITS {
            tracing::debug!(digits = digits.len(), "Currency text too long, treating as zero");
            return Money::ZERO;
        }

        digits
            .parse::<i128>()
            .ok()
            .and_then(|cents| Decimal::try_from_i128_with_scale(cents, MONEY_SCALE).ok())
            .map(Money)
            .unwrap_or(Money::ZERO)
    }

    /// Render with the default (BRL) currency convention
    pub fn format(&self) -> String {
        self.format_with(&CurrencyFormat::default())
    }

    /// Render with an explicit currency convention
    ///
    /// Negative amounts get a leading `-`. `parse` ignores signs, so
    /// `parse(format(x)) == x` only holds for non-negative amounts; a negative
    /// amount parses back to its magnitude.
    pub fn format_with(&self, currency: &CurrencyFormat) -> String {
        let cents = self.cents();
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        let units = (abs / 100).to_string();
        let fraction = abs % 100;

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, digit) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(currency.thousands_separator);
            }
            grouped.push(digit);
        }

        // The locale formatter separates symbol and amount with a no-break space
        format!(
            "{sign}{}\u{a0}{grouped}{}{fraction:02}",
            currency.symbol, currency.decimal_separator
        )
    }

    /// Re-render raw input text the way a price field shows it after a keystroke
    pub fn mask(text: &str) -> String {
        Money::parse(text).format()
    }

    /// Multiply by a scalar (quantity, percentage factor), rounding to cents
    ///
    /// `None` when the product does not fit in a Decimal.
    pub fn multiply(&self, scalar: Decimal) -> Option<Money> {
        self.0.checked_mul(scalar).map(Money::from_decimal)
    }

    /// `None` on overflow
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// `None` on overflow
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Subtract, clamping the result at zero
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0)).max(Money::ZERO)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money::from_decimal(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// Order storage expects plain JSON numbers for monetary fields
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer).map(Money::from_decimal)
    }
}
