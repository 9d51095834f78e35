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

//! Postings and balanced transactions.
//!
//! A [`Transaction`] can only be obtained through [`Transaction::build`] (or
//! [`build_transaction`]), which enforces:
//!
//! - at least two postings,
//! - postings summing to zero within [`BALANCE_TOLERANCE`],
//! - a single currency across all postings.
//!
//! Once built it is immutable.

use crate::account::AccountName;
use crate::amount::Amount;
use crate::base::{Currency, TransactionId};
use crate::error::ValidationError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Largest residual a balanced transaction may carry.
pub const BALANCE_TOLERANCE: Decimal = dec!(0.01);

/// One signed amount against one account.
///
/// Positive increases a debit-normal account (Assets, Expenses); negative
/// increases a credit-normal one (Liabilities, Equity, Income).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    account: AccountName,
    amount: Amount,
    currency: Currency,
}

impl Posting {
    pub fn new(account: AccountName, amount: Amount, currency: Currency) -> Result<Self, ValidationError> {
        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }
        Ok(Self {
            account,
            amount,
            currency,
        })
    }

    pub fn account(&self) -> &AccountName {
        &self.account
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_credit(&self) -> bool {
        !self.is_debit()
    }
}

/// A balanced, single-currency set of postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    date: NaiveDate,
    description: String,
    postings: Vec<Posting>,
    metadata: BTreeMap<String, String>,
}

impl Transaction {
    /// Validates and assembles a transaction.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::TooFewPostings`] - fewer than two postings.
    /// - [`ValidationError::MixedCurrencies`] - postings in more than one currency.
    /// - [`ValidationError::Unbalanced`] - residual larger than [`BALANCE_TOLERANCE`].
    pub fn build(
        id: TransactionId,
        date: NaiveDate,
        description: impl Into<String>,
        postings: Vec<Posting>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self, ValidationError> {
        if postings.len() < 2 {
            return Err(ValidationError::TooFewPostings(postings.len()));
        }

        let currencies: BTreeSet<&Currency> = postings.iter().map(Posting::currency).collect();
        if currencies.len() > 1 {
            return Err(ValidationError::MixedCurrencies(
                currencies.into_iter().cloned().collect(),
            ));
        }

        let residual: Amount = postings.iter().map(Posting::amount).sum();
        if residual.value().abs() > BALANCE_TOLERANCE {
            return Err(ValidationError::Unbalanced(residual.value()));
        }

        Ok(Self {
            id,
            date,
            description: description.into(),
            postings,
            metadata,
        })
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Shared currency of every posting.
    pub fn currency(&self) -> &Currency {
        // At least two postings exist by construction.
        self.postings[0].currency()
    }

    /// Sum of all postings; within [`BALANCE_TOLERANCE`] of zero.
    pub fn residual(&self) -> Amount {
        self.postings.iter().map(Posting::amount).sum()
    }

    /// First posting against `account`, if any.
    pub fn get_posting(&self, account: &AccountName) -> Option<&Posting> {
        self.postings.iter().find(|p| p.account() == account)
    }
}

/// Free-function form of [`Transaction::build`].
pub fn build_transaction(
    id: TransactionId,
    date: NaiveDate,
    description: impl Into<String>,
    postings: Vec<Posting>,
    metadata: BTreeMap<String, String>,
) -> Result<Transaction, ValidationError> {
    Transaction::build(id, date, description, postings, metadata)
}
