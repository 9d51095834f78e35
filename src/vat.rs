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

//! Splitting VAT-inclusive totals.
//!
//! `net = round(total / (1 + rate))` and `tax = total - net`. The tax is the
//! exact remainder, so the two parts always add back up to the total.
//!
//! # Example
//!
//! ```
//! use ledger_import_rs::{split_inclusive_total, Amount};
//! use rust_decimal_macros::dec;
//!
//! let split = split_inclusive_total(Amount::new(dec!(118.00)), dec!(0.18)).unwrap();
//! assert_eq!(split.net, Amount::new(dec!(100.00)));
//! assert_eq!(split.tax, Amount::new(dec!(18.00)));
//! ```

use crate::amount::Amount;
use crate::error::ValidationError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Net and tax components of a VAT-inclusive total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatSplit {
    pub net: Amount,
    pub tax: Amount,
}

/// A VAT rate known to be greater than -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct VatRate(Decimal);

impl VatRate {
    /// Georgian standard rate.
    pub const STANDARD: VatRate = VatRate(dec!(0.18));

    pub fn new(rate: Decimal) -> Result<Self, ValidationError> {
        if rate <= Decimal::NEGATIVE_ONE {
            return Err(ValidationError::InvalidVatRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn split(&self, total: Amount) -> Result<VatSplit, ValidationError> {
        split_inclusive_total(total, self.0)
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl TryFrom<Decimal> for VatRate {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VatRate> for Decimal {
    fn from(value: VatRate) -> Self {
        value.0
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * dec!(100)).normalize())
    }
}

/// Splits a tax-inclusive `total` at `rate` into net and tax.
///
/// # Errors
///
/// - [`ValidationError::InvalidVatRate`] if `rate <= -1`.
/// - [`ValidationError::ZeroTotal`] if `total` is zero.
pub fn split_inclusive_total(total: Amount, rate: Decimal) -> Result<VatSplit, ValidationError> {
    if rate <= Decimal::NEGATIVE_ONE {
        return Err(ValidationError::InvalidVatRate(rate));
    }
    if total.is_zero() {
        return Err(ValidationError::ZeroTotal);
    }

    let divisor = Decimal::ONE + rate;
    let net = total
        .value()
        .checked_div(divisor)
        .map(Amount::new)
        .ok_or(ValidationError::InvalidVatRate(rate))?;
    let tax = total - net;

    debug_assert_eq!(net + tax, total, "Invariant violated: VAT split lost a cent");
    Ok(VatSplit { net, tax })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: Decimal) -> Amount {
        Amount::new(value)
    }

    #[test]
    fn standard_rate_round_numbers() {
        let split = split_inclusive_total(amount(dec!(118.00)), dec!(0.18)).unwrap();
        assert_eq!(split.net, amount(dec!(100.00)));
        assert_eq!(split.tax, amount(dec!(18.00)));
    }

    #[test]
    fn remainder_goes_to_tax() {
        // 100 / 1.18 = 84.7457... -> 84.75
        let split = split_inclusive_total(amount(dec!(100.00)), dec!(0.18)).unwrap();
        assert_eq!(split.net, amount(dec!(84.75)));
        assert_eq!(split.tax, amount(dec!(15.25)));
        assert_eq!(split.net + split.tax, amount(dec!(100.00)));
    }

    #[test]
    fn one_cent_total() {
        let split = split_inclusive_total(amount(dec!(0.01)), dec!(0.18)).unwrap();
        assert_eq!(split.net, amount(dec!(0.01)));
        assert_eq!(split.tax, Amount::ZERO);
    }

    #[test]
    fn zero_rate_puts_everything_in_net() {
        let split = split_inclusive_total(amount(dec!(50)), Decimal::ZERO).unwrap();
        assert_eq!(split.net, amount(dec!(50)));
        assert!(split.tax.is_zero());
    }

    #[test]
    fn negative_total_splits_symmetrically() {
        let split = split_inclusive_total(amount(dec!(-118)), dec!(0.18)).unwrap();
        assert_eq!(split.net, amount(dec!(-100)));
        assert_eq!(split.tax, amount(dec!(-18)));
    }

    #[test]
    fn rejects_degenerate_rates() {
        assert_eq!(
            split_inclusive_total(amount(dec!(10)), dec!(-1)),
            Err(ValidationError::InvalidVatRate(dec!(-1)))
        );
        assert_eq!(
            split_inclusive_total(amount(dec!(10)), dec!(-2.5)),
            Err(ValidationError::InvalidVatRate(dec!(-2.5)))
        );
    }

    #[test]
    fn rejects_zero_total() {
        assert_eq!(
            split_inclusive_total(Amount::ZERO, dec!(0.18)),
            Err(ValidationError::ZeroTotal)
        );
    }

    #[test]
    fn vat_rate_validation_and_display() {
        assert_eq!(VatRate::default().value(), dec!(0.18));
        assert_eq!(VatRate::STANDARD.to_string(), "18%");
        assert!(VatRate::new(dec!(-1)).is_err());
        assert!(VatRate::new(dec!(-0.5)).is_ok());
        assert_eq!(
            VatRate::new(dec!(0.20)).unwrap().split(amount(dec!(120))).unwrap().net,
            amount(dec!(100))
        );
    }
}
