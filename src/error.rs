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

//! Error types for import, validation and configuration.
//!
//! Three tiers, from narrowest to widest blast radius:
//!
//! - [`ValidationError`]: one value or one transaction is malformed.
//! - [`ProcessingError`]: one record could not be turned into a transaction
//!   or written out. The batch keeps going.
//! - [`ConfigurationError`]: the pipeline itself is mis-specified. Nothing is
//!   processed.

use crate::base::{Currency, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Malformed or invariant-violating input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Input could not be read as a base-10 number
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    /// A posting was given a zero amount
    #[error("posting amount cannot be zero")]
    ZeroAmount,

    /// A positive amount was required
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Currency code is not three uppercase ASCII letters
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// Account name breaks the hierarchy rules
    #[error("invalid account name {name:?}: {reason}")]
    InvalidAccountName { name: String, reason: &'static str },

    /// Transaction has fewer than two postings
    #[error("transaction must have at least 2 postings, got {0}")]
    TooFewPostings(usize),

    /// Postings do not sum to zero within tolerance
    #[error("transaction does not balance: residual {0}")]
    Unbalanced(Decimal),

    /// Postings use more than one currency
    #[error("mixed currencies in transaction: {0:?}")]
    MixedCurrencies(Vec<Currency>),

    /// VAT rate would divide by zero or flip the sign
    #[error("invalid VAT rate {0} (must be greater than -1)")]
    InvalidVatRate(Decimal),

    /// VAT split requested for a zero total
    #[error("cannot split a zero total")]
    ZeroTotal,

    /// Date string did not match any accepted layout
    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    /// Source is missing columns the rules depend on
    #[error("missing columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// Transaction id already recorded in this ledger
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(TransactionId),
}

/// Failure to transform, read or write a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Required field absent or blank
    #[error("missing field {0:?}")]
    MissingField(String),

    /// Field present but unusable
    #[error("field {field:?}: {source}")]
    InvalidField {
        field: String,
        source: ValidationError,
    },

    /// No registered rule accepted the record
    #[error("no rule applies to record")]
    NoMatchingRule,

    /// Source row could not be decoded
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Ledger text could not be parsed
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Underlying reader or writer failed
    #[error("i/o error: {0}")]
    Io(String),
}

impl ProcessingError {
    pub fn invalid_field(field: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidField {
            field: field.into(),
            source,
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ProcessingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for ProcessingError {
    fn from(err: csv::Error) -> Self {
        Self::MalformedRecord(err.to_string())
    }
}

/// Pipeline set up wrongly. Fatal before any record is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Configured account does not start with a known account type
    #[error("unknown account type prefix in {0:?}")]
    UnknownAccountType(String),

    /// Configured account is otherwise malformed
    #[error("invalid account {name:?}: {source}")]
    InvalidAccount {
        name: String,
        source: ValidationError,
    },

    #[error("invalid currency {0:?}")]
    InvalidCurrency(String),

    #[error("invalid VAT rate {0}")]
    InvalidVatRate(Decimal),

    /// Engine was given nothing to dispatch to
    #[error("no transformation rules registered")]
    EmptyRuleSet,

    /// Rule set could hand the same record to more than one rule
    #[error("ambiguous rule set: {0}")]
    AmbiguousRules(String),

    /// Config file could not be read or decoded
    #[error("cannot load configuration: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn validation_display_messages() {
        assert_eq!(
            ValidationError::ZeroAmount.to_string(),
            "posting amount cannot be zero"
        );
        assert_eq!(
            ValidationError::TooFewPostings(1).to_string(),
            "transaction must have at least 2 postings, got 1"
        );
        assert_eq!(
            ValidationError::Unbalanced(dec!(5.00)).to_string(),
            "transaction does not balance: residual 5.00"
        );
        assert_eq!(
            ValidationError::InvalidVatRate(dec!(-1)).to_string(),
            "invalid VAT rate -1 (must be greater than -1)"
        );
        assert_eq!(
            ValidationError::DuplicateTransaction(TransactionId::from("txn_1")).to_string(),
            "duplicate transaction id txn_1"
        );
    }

    #[test]
    fn processing_error_wraps_validation_transparently() {
        let err: ProcessingError = ValidationError::ZeroTotal.into();
        assert_eq!(err.to_string(), "cannot split a zero total");
        assert_eq!(err, ProcessingError::Validation(ValidationError::ZeroTotal));
    }

    #[test]
    fn invalid_field_names_the_field() {
        let err = ProcessingError::invalid_field(
            "amount",
            ValidationError::InvalidAmount("abc".to_string()),
        );
        assert_eq!(err.to_string(), "field \"amount\": invalid amount: \"abc\"");
    }

    #[test]
    fn io_errors_are_flattened_to_messages() {
        let io = std::io::Error::other("disk full");
        let err = ProcessingError::from(io);
        assert_eq!(err, ProcessingError::Io("disk full".to_string()));
    }

    #[test]
    fn configuration_display_messages() {
        assert_eq!(
            ConfigurationError::UnknownAccountType("Stuff:Bank".to_string()).to_string(),
            "unknown account type prefix in \"Stuff:Bank\""
        );
        assert_eq!(
            ConfigurationError::EmptyRuleSet.to_string(),
            "no transformation rules registered"
        );
        assert_eq!(
            ConfigurationError::AmbiguousRules("two catch-all rules".to_string()).to_string(),
            "ambiguous rule set: two catch-all rules"
        );
    }
}
