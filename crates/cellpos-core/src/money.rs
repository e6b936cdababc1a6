//! # Money Module
//!
//! Provides the `Money` and `Percent` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With binary floats:                                                    │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer ten-thousandths                                  │
//! │    12.50 is stored as 125000                                            │
//! │    Four decimals of precision, displayed at two                         │
//! │    Every sum in a report is exact                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cellpos_core::money::Money;
//!
//! let price: Money = "12.50".parse().unwrap();
//! assert_eq!(price.units(), 125_000);
//!
//! let line = price * 3;
//! assert_eq!(line.to_string(), "37.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Number of stored units per whole currency unit.
pub const MONEY_SCALE: i64 = 10_000;

/// Maximum number of fraction digits accepted when parsing an amount.
pub const MONEY_FRACTION_DIGITS: usize = 4;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in ten-thousandths of the shop currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: change on a partial payment and wallet outflows are negative
/// - **Four decimals**: wallet fees and percentage discounts keep sub-cent precision
/// - **Stored as INTEGER**: the database never sees a float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.sale_price ──► SaleItem.unit_price ──► SaleItem.total         │
/// │                                                                         │
/// │  Σ SaleItem.total = Sale.subtotal ──► discount, tax ──► Sale.total     │
/// │                                                                         │
/// │  WalletTransaction.amount / fees / net_amount                           │
/// │  Repair.estimated_cost / actual_cost / parts_cost / labor_cost          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from raw ten-thousandth units.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_core::money::Money;
    ///
    /// let fee = Money::from_units(12_345); // 1.2345
    /// assert_eq!(fee.units(), 12_345);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Creates a Money value from a whole number of currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MONEY_SCALE)
    }

    /// Creates a Money value from major units and cents.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_core::money::Money;
    ///
    /// let price = Money::from_major_minor(10, 99);
    /// assert_eq!(price.to_string(), "10.99");
    ///
    /// let negative = Money::from_major_minor(-5, 50);
    /// assert_eq!(negative.to_string(), "-5.50");
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, cents: i64) -> Self {
        if major < 0 {
            Money(major * MONEY_SCALE - cents * 100)
        } else {
            Money(major * MONEY_SCALE + cents * 100)
        }
    }

    /// Returns the raw ten-thousandth units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// Ledger and checkout code uses [`Money::checked_multiply_quantity`];
    /// this form is for read-side figures such as stock value.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Phone case 12.50
    /// Quantity: 3
    ///      │
    ///      ▼
    /// multiply_quantity(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: 37.50
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity, or `None` on overflow.
    ///
    /// ```rust
    /// use cellpos_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(2).checked_multiply_quantity(3), Some(Money::from_major(6)));
    /// assert_eq!(Money::from_major(1).checked_multiply_quantity(i64::MAX), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(units) => Some(Money(units)),
            None => None,
        }
    }

    /// Returns `rate` of this amount, rounded half away from zero to a unit.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_core::money::{Money, Percent};
    ///
    /// let subtotal = Money::from_major(200);
    /// let tax = subtotal.percent_of(Percent::from_bps(1400)); // 14%
    /// assert_eq!(tax, Money::from_major(28));
    /// ```
    pub fn percent_of(&self, rate: Percent) -> Money {
        Money(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Rounds to whole cents, half away from zero.
    pub fn round_to_cents(&self) -> Money {
        Money(div_round(self.0 as i128, 100) as i64 * 100)
    }

    /// Ratio of `self` over `base` as a percentage, or `None` when base is zero.
    ///
    /// Used for profit margins: `(sale − buy) / buy · 100`.
    pub fn ratio_percent(&self, base: Money) -> Option<f64> {
        if base.is_zero() {
            return None;
        }
        Some(self.0 as f64 / base.0 as f64 * 100.0)
    }

    /// Exact decimal rendering with trailing zeros trimmed ("12.5", "7", "0.0025").
    ///
    /// Used for CSV export where display rounding would lose data.
    pub fn to_plain_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MONEY_SCALE as u64;
        let frac = abs % MONEY_SCALE as u64;
        if frac == 0 {
            return format!("{sign}{major}");
        }
        let digits = format!("{frac:04}");
        format!("{sign}{major}.{}", digits.trim_end_matches('0'))
    }
}

/// Integer division rounding half away from zero.
fn div_round(num: i128, den: i128) -> i128 {
    let q = num / den;
    let r = num % den;
    if r.abs() * 2 >= den {
        q + num.signum()
    } else {
        q
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount at two decimals without a currency symbol.
///
/// The currency code is a shop setting, so the presentation layer adds it.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = div_round(self.0 as i128, 100);
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Parses a plain decimal string: optional sign, digits, up to four fraction digits.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (negative, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ValidationError::invalid_format("amount", "empty amount"));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("'{raw}' is not a decimal number"),
            ));
        }
        if frac_part.len() > MONEY_FRACTION_DIGITS {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("'{raw}' has more than {MONEY_FRACTION_DIGITS} decimal places"),
            ));
        }

        let major: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| ValidationError::invalid_format("amount", "amount too large"))?
        };
        let frac: i64 = format!("{frac_part:0<4}")
            .parse()
            .map_err(|_| ValidationError::invalid_format("amount", "bad fraction"))?;

        let units = major
            .checked_mul(MONEY_SCALE)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount too large"))?;

        Ok(Money(if negative { -units } else { units }))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Percent Type
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// ## Example
/// ```rust
/// use cellpos_core::money::Percent;
///
/// let rate: Percent = "14".parse().unwrap();
/// assert_eq!(rate.bps(), 1400);
///
/// let fine: Percent = "8.25".parse().unwrap();
/// assert_eq!(fine.bps(), 825);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Percent(i64);

impl Percent {
    /// 100%.
    pub const FULL: Percent = Percent(10_000);

    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Percent(bps)
    }

    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True when the value lies in 0%..=100%.
    pub const fn is_valid_fraction(&self) -> bool {
        self.0 >= 0 && self.0 <= 10_000
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

/// Parses a percentage string ("14", "8.25", "12.5%") into basis points.
impl FromStr for Percent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_end_matches('%').trim();
        if raw.is_empty() {
            return Ok(Percent::zero());
        }
        let money: Money = raw
            .parse()
            .map_err(|_| ValidationError::invalid_format("percent", format!("'{s}' is not a percentage")))?;
        // Money carries four decimals, bps need two.
        if money.units() % 100 != 0 {
            return Err(ValidationError::invalid_format(
                "percent",
                format!("'{s}' has more than 2 decimal places"),
            ));
        }
        Ok(Percent(money.units() / 100))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_units_and_major() {
        assert_eq!(Money::from_major(12).units(), 120_000);
        assert_eq!(Money::from_major_minor(12, 50).units(), 125_000);
        assert_eq!(Money::from_major_minor(-5, 50).units(), -55_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_major_minor(10, 99).to_string(), "10.99");
        assert_eq!(Money::from_major(5).to_string(), "5.00");
        assert_eq!(Money::from_major_minor(-5, 50).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
        // 0.125 rounds half away from zero
        assert_eq!(Money::from_units(1250).to_string(), "0.13");
        assert_eq!(Money::from_units(-1250).to_string(), "-0.13");
    }

    #[test]
    fn test_parse() {
        assert_eq!("12.50".parse::<Money>().unwrap().units(), 125_000);
        assert_eq!("7".parse::<Money>().unwrap().units(), 70_000);
        assert_eq!(".5".parse::<Money>().unwrap().units(), 5_000);
        assert_eq!("0.0025".parse::<Money>().unwrap().units(), 25);
        assert_eq!(" -3.1 ".parse::<Money>().unwrap().units(), -31_000);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.23456".parse::<Money>().is_err());
        assert!("1,000".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(Money::from_units(125_000).to_plain_string(), "12.5");
        assert_eq!(Money::from_major(7).to_plain_string(), "7");
        assert_eq!(Money::from_units(25).to_plain_string(), "0.0025");
        assert_eq!(Money::from_units(-31_000).to_plain_string(), "-3.1");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(10);
        let b = Money::from_major(5);

        assert_eq!(a + b, Money::from_major(15));
        assert_eq!(a - b, Money::from_major(5));
        assert_eq!(a * 3, Money::from_major(30));
        assert_eq!(a.checked_multiply_quantity(3), Some(Money::from_major(30)));
        assert_eq!(a.checked_multiply_quantity(i64::MAX), None);
        assert_eq!(a * i64::MAX, Money::from_units(i64::MAX));
        assert_eq!(-a, Money::from_major(-10));

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total, Money::from_major(20));
    }

    #[test]
    fn test_percent_of() {
        let subtotal = Money::from_major(200);
        assert_eq!(subtotal.percent_of(Percent::from_bps(1400)), Money::from_major(28));

        // 0.0001 × 50% = 0.00005 → rounds away from zero
        assert_eq!(Money::from_units(1).percent_of(Percent::from_bps(5000)).units(), 1);
        assert_eq!(Money::from_units(-1).percent_of(Percent::from_bps(5000)).units(), -1);
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(Money::from_units(12_345).round_to_cents().units(), 12_300);
        assert_eq!(Money::from_units(12_350).round_to_cents().units(), 12_400);
    }

    #[test]
    fn test_ratio_percent() {
        let margin = (Money::from_major(150) - Money::from_major(100)).ratio_percent(Money::from_major(100));
        assert_eq!(margin, Some(50.0));
        assert_eq!(Money::from_major(1).ratio_percent(Money::zero()), None);
    }

    #[test]
    fn test_percent_parse_and_display() {
        assert_eq!("14".parse::<Percent>().unwrap().bps(), 1400);
        assert_eq!("8.25%".parse::<Percent>().unwrap().bps(), 825);
        assert_eq!("".parse::<Percent>().unwrap(), Percent::zero());
        assert!("8.255".parse::<Percent>().is_err());
        assert!("ten".parse::<Percent>().is_err());

        assert_eq!(Percent::from_bps(1400).to_string(), "14");
        assert_eq!(Percent::from_bps(1250).to_string(), "12.5");
        assert_eq!(Percent::from_bps(825).to_string(), "8.25");
        assert!(Percent::FULL.is_valid_fraction());
        assert!(!Percent::from_bps(10_001).is_valid_fraction());
    }
}
