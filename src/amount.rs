// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Exact monetary amounts.
//!
//! An [`Amount`] is a [`Decimal`] held at exactly two fractional digits.
//! Rounding is half-up (midpoint away from zero), never banker's rounding,
//! so `0.005` becomes `0.01` and `-0.005` becomes `-0.01`.
//!
//! # Example
//!
//! ```
//! use ledger_import_rs::{make_amount, Amount};
//! use rust_decimal_macros::dec;
//!
//! let amount = make_amount("118.005").unwrap();
//! assert_eq!(amount, Amount::new(dec!(118.01)));
//! assert_eq!(amount.to_string(), "118.01");
//! ```

use crate::error::ValidationError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// Monetary amount rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    const DECIMAL_PLACES: u32 = 2;

    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Largest magnitude accepted from parsed or converted input.
    pub const LIMIT: Decimal = dec!(1000000000000000);

    /// Rounds `value` half-up to two places.
    pub fn new(value: Decimal) -> Self {
        let mut rounded =
            value.round_dp_with_strategy(Self::DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(Self::DECIMAL_PLACES);
        Self(rounded)
    }

    /// Parses plain or scientific base-10 notation.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidAmount(raw.to_string()));
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| ValidationError::InvalidAmount(raw.to_string()))
            .and_then(|value| Self::bounded(value, raw))
    }

    /// Parses spreadsheet-formatted figures such as `"1,234.50"` or `"₾ 118.00"`.
    ///
    /// Everything except digits, `.` and `-` is discarded before parsing. Fails
    /// when no number remains; a garbage cell never becomes zero.
    pub fn parse_loose(raw: &str) -> Result<Self, ValidationError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidAmount(raw.to_string()));
        }
        Decimal::from_str(&cleaned)
            .map_err(|_| ValidationError::InvalidAmount(raw.to_string()))
            .and_then(|value| Self::bounded(value, raw))
    }

    /// Rounds `value`, rejecting magnitudes above [`Amount::LIMIT`].
    fn bounded(value: Decimal, raw: impl fmt::Display) -> Result<Self, ValidationError> {
        if value.abs() > Self::LIMIT {
            return Err(ValidationError::InvalidAmount(raw.to_string()));
        }
        Ok(Self::new(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

/// Inputs accepted by [`make_amount`].
pub trait IntoAmount {
    fn into_amount(self) -> Result<Amount, ValidationError>;
}

impl IntoAmount for &str {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Amount::parse(self)
    }
}

impl IntoAmount for String {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Amount::parse(&self)
    }
}

impl IntoAmount for &String {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Amount::parse(self)
    }
}

impl IntoAmount for Decimal {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Amount::bounded(self, self)
    }
}

impl IntoAmount for i64 {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Amount::bounded(Decimal::from(self), self)
    }
}

impl IntoAmount for i32 {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Ok(Amount::new(Decimal::from(self)))
    }
}

impl IntoAmount for u32 {
    fn into_amount(self) -> Result<Amount, ValidationError> {
        Ok(Amount::new(Decimal::from(self)))
    }
}

/// Builds an [`Amount`] from a string, integer or decimal.
pub fn make_amount(raw: impl IntoAmount) -> Result<Amount, ValidationError> {
    raw.into_amount()
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_not_to_even() {
        assert_eq!(Amount::new(dec!(0.005)).value(), dec!(0.01));
        assert_eq!(Amount::new(dec!(0.015)).value(), dec!(0.02));
        assert_eq!(Amount::new(dec!(0.025)).value(), dec!(0.03));
        assert_eq!(Amount::new(dec!(-0.005)).value(), dec!(-0.01));
        assert_eq!(Amount::new(dec!(1.004)).value(), dec!(1.00));
    }

    #[test]
    fn always_two_decimal_places() {
        assert_eq!(Amount::new(dec!(5)).to_string(), "5.00");
        assert_eq!(Amount::new(dec!(5.1)).to_string(), "5.10");
        assert_eq!(Amount::new(dec!(-12.345)).to_string(), "-12.35");
        assert_eq!(Amount::new(dec!(5)).value().scale(), 2);
    }

    #[test]
    fn make_amount_accepts_strings_integers_and_decimals() {
        assert_eq!(make_amount("118.00").unwrap(), Amount::new(dec!(118)));
        assert_eq!(make_amount(" 42 ").unwrap(), Amount::new(dec!(42)));
        assert_eq!(make_amount("1e2").unwrap(), Amount::new(dec!(100)));
        assert_eq!(make_amount(7i64).unwrap(), Amount::new(dec!(7)));
        assert_eq!(make_amount(-3i32).unwrap(), Amount::new(dec!(-3)));
        assert_eq!(make_amount(dec!(9.999)).unwrap(), Amount::new(dec!(10.00)));
        assert_eq!(make_amount(String::from("0.1")).unwrap(), Amount::new(dec!(0.10)));
    }

    #[test]
    fn make_amount_rejects_non_numbers() {
        for bad in ["", "   ", "abc", "12,50", "NaN", "1.2.3", "--1"] {
            assert_eq!(
                make_amount(bad),
                Err(ValidationError::InvalidAmount(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn loose_parse_strips_formatting() {
        assert_eq!(Amount::parse_loose("1,234.50").unwrap(), Amount::new(dec!(1234.50)));
        assert_eq!(Amount::parse_loose("₾ 118.00").unwrap(), Amount::new(dec!(118)));
        assert_eq!(Amount::parse_loose("118.00 GEL").unwrap(), Amount::new(dec!(118)));
        assert_eq!(Amount::parse_loose("-5").unwrap(), Amount::new(dec!(-5)));
    }

    #[test]
    fn oversized_figures_are_rejected() {
        let huge = "40000000000000000000000000000";
        assert_eq!(Amount::parse(huge), Err(ValidationError::InvalidAmount(huge.to_string())));
        assert_eq!(
            Amount::parse_loose("40,000,000,000,000,000,000,000,000,000"),
            Err(ValidationError::InvalidAmount("40,000,000,000,000,000,000,000,000,000".to_string()))
        );
        assert!(Amount::parse("1000000000000000.01").is_err());
        assert!(make_amount(i64::MAX).is_err());
        assert!(make_amount(-Amount::LIMIT - dec!(1)).is_err());

        assert_eq!(Amount::parse("1000000000000000").unwrap().value(), Amount::LIMIT);
        assert_eq!(make_amount(-Amount::LIMIT).unwrap().value(), -Amount::LIMIT);
    }

    #[test]
    fn loose_parse_never_coerces_to_zero() {
        assert!(Amount::parse_loose("").is_err());
        assert!(Amount::parse_loose("n/a").is_err());
        assert!(Amount::parse_loose("-").is_err());
        assert!(Amount::parse_loose("1-2").is_err());
    }

    #[test]
    fn arithmetic_is_exact() {
        let total: Amount = (0..10).map(|_| Amount::new(dec!(0.10))).sum();
        assert_eq!(total, Amount::new(dec!(1.00)));
        assert_eq!(Amount::new(dec!(5)) - Amount::new(dec!(7.5)), Amount::new(dec!(-2.5)));
        assert_eq!(-Amount::new(dec!(3)), Amount::new(dec!(-3)));
        assert_eq!(Amount::new(dec!(-3)).abs(), Amount::new(dec!(3)));
    }

    #[test]
    fn equal_values_compare_equal_regardless_of_input_scale() {
        assert_eq!(Amount::new(dec!(1)), Amount::new(dec!(1.000)));
    }
}
