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

//! Batch ledger accumulation.
//!
//! A [`LedgerBuilder`] collects transactions in input order and rejects
//! duplicate transaction ids. [`LedgerBuilder::finalize`] derives the account
//! set and per-account balances once, producing an immutable [`Ledger`].
//!
//! # Example
//!
//! ```
//! use ledger_import_rs::{
//!     AccountName, Amount, Currency, LedgerBuilder, Posting, Transaction, TransactionId,
//! };
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use std::collections::BTreeMap;
//!
//! let gel = Currency::new("GEL").unwrap();
//! let bank: AccountName = "Assets:Bank".parse().unwrap();
//! let receivable: AccountName = "Assets:Receivables:Acme".parse().unwrap();
//! let tx = Transaction::build(
//!     TransactionId::from("txn_1"),
//!     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     "Payment received from Acme",
//!     vec![
//!         Posting::new(bank.clone(), Amount::new(dec!(50)), gel.clone()).unwrap(),
//!         Posting::new(receivable, Amount::new(dec!(-50)), gel).unwrap(),
//!     ],
//!     BTreeMap::new(),
//! )
//! .unwrap();
//!
//! let mut builder = LedgerBuilder::new();
//! builder.record(tx).unwrap();
//! let ledger = builder.finalize();
//! assert_eq!(ledger.balance(&bank), Amount::new(dec!(50)));
//! ```

use crate::account::AccountName;
use crate::amount::Amount;
use crate::base::TransactionId;
use crate::error::ValidationError;
use crate::reconcile::PostingSource;
use crate::transaction::{Posting, Transaction};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Accumulates transactions for one batch run.
#[derive(Debug, Default)]
pub struct LedgerBuilder {
    /// Transactions in the order they were recorded.
    transactions: Vec<Transaction>,
    /// Ids seen so far, for duplicate detection.
    ids: HashSet<TransactionId>,
    /// Accounts that must be opened even if nothing posts to them.
    declared: BTreeSet<AccountName>,
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateTransaction`] if a transaction with
    /// the same id was already recorded. The builder is left unchanged.
    pub fn record(&mut self, transaction: Transaction) -> Result<(), ValidationError> {
        if !self.ids.insert(transaction.id().clone()) {
            return Err(ValidationError::DuplicateTransaction(transaction.id().clone()));
        }
        self.transactions.push(transaction);
        Ok(())
    }

    /// Registers accounts a rule relies on, whether or not anything posts to them.
    pub fn declare_accounts(&mut self, accounts: impl IntoIterator<Item = AccountName>) {
        self.declared.extend(accounts);
    }

    /// True if a transaction with this id was already recorded.
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Derives the account set and per-account balances.
    pub fn finalize(self) -> Ledger {
        let mut balances: BTreeMap<AccountName, Amount> = BTreeMap::new();
        for posting in self.transactions.iter().flat_map(Transaction::postings) {
            *balances.entry(posting.account().clone()).or_default() += posting.amount();
        }

        let mut accounts = self.declared;
        accounts.extend(balances.keys().cloned());

        Ledger {
            transactions: self.transactions,
            accounts,
            balances,
        }
    }
}

/// Finalized batch of transactions with derived balances.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    accounts: BTreeSet<AccountName>,
    balances: BTreeMap<AccountName, Amount>,
}

impl Ledger {
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Every account posted to or declared, sorted lexicographically.
    pub fn accounts(&self) -> &BTreeSet<AccountName> {
        &self.accounts
    }

    /// Per-account running balance.
    pub fn balances(&self) -> &BTreeMap<AccountName, Amount> {
        &self.balances
    }

    /// Balance of one account; zero if nothing posted to it.
    pub fn balance(&self, account: &AccountName) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl PostingSource for Ledger {
    fn dated_postings(&self) -> Box<dyn Iterator<Item = (NaiveDate, &Posting)> + '_> {
        Box::new(
            self.transactions
                .iter()
                .flat_map(|tx| tx.postings().iter().map(move |p| (tx.date(), p))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(name: &str) -> AccountName {
        AccountName::new(name).unwrap()
    }

    fn transfer(id: &str, from: &str, to: &str, amount: Decimal) -> Transaction {
        let gel = Currency::new("GEL").unwrap();
        Transaction::build(
            TransactionId::from(id),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "transfer",
            vec![
                Posting::new(account(to), Amount::new(amount), gel.clone()).unwrap(),
                Posting::new(account(from), Amount::new(-amount), gel).unwrap(),
            ],
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn record_preserves_order() {
        let mut builder = LedgerBuilder::new();
        builder
            .record(transfer("b", "Income:Sales", "Assets:Cash", dec!(1)))
            .unwrap();
        builder
            .record(transfer("a", "Income:Sales", "Assets:Cash", dec!(2)))
            .unwrap();
        let ledger = builder.finalize();

        let ids: Vec<&str> = ledger.transactions().iter().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_id_is_rejected_and_ignored() {
        let mut builder = LedgerBuilder::new();
        builder
            .record(transfer("txn_1", "Income:Sales", "Assets:Cash", dec!(10)))
            .unwrap();
        let result = builder.record(transfer("txn_1", "Income:Sales", "Assets:Cash", dec!(99)));

        assert_eq!(
            result,
            Err(ValidationError::DuplicateTransaction(TransactionId::from("txn_1")))
        );
        assert_eq!(builder.len(), 1);
        assert!(builder.contains(&TransactionId::from("txn_1")));
        assert_eq!(builder.finalize().balance(&account("Assets:Cash")), Amount::new(dec!(10)));
    }

    #[test]
    fn finalize_derives_balances_and_accounts() {
        let mut builder = LedgerBuilder::new();
        builder
            .record(transfer("1", "Income:Sales", "Assets:Cash", dec!(100)))
            .unwrap();
        builder
            .record(transfer("2", "Income:Sales", "Assets:Bank", dec!(40)))
            .unwrap();
        builder
            .record(transfer("3", "Assets:Cash", "Assets:Bank", dec!(25)))
            .unwrap();
        let ledger = builder.finalize();

        assert_eq!(ledger.balance(&account("Assets:Cash")), Amount::new(dec!(75)));
        assert_eq!(ledger.balance(&account("Assets:Bank")), Amount::new(dec!(65)));
        assert_eq!(ledger.balance(&account("Income:Sales")), Amount::new(dec!(-140)));
        assert_eq!(ledger.balance(&account("Expenses:Unused")), Amount::ZERO);

        let names: Vec<&str> = ledger.accounts().iter().map(AccountName::as_str).collect();
        assert_eq!(names, vec!["Assets:Bank", "Assets:Cash", "Income:Sales"]);
    }

    #[test]
    fn declared_accounts_are_included_without_balance() {
        let mut builder = LedgerBuilder::new();
        builder.declare_accounts([account("Assets:Receivables")]);
        builder
            .record(transfer("1", "Income:Sales", "Assets:Cash", dec!(1)))
            .unwrap();
        let ledger = builder.finalize();

        assert!(ledger.accounts().contains(&account("Assets:Receivables")));
        assert!(!ledger.balances().contains_key(&account("Assets:Receivables")));
    }

    #[test]
    fn empty_builder_finalizes_to_empty_ledger() {
        let ledger = LedgerBuilder::new().finalize();
        assert!(ledger.is_empty());
        assert!(ledger.accounts().is_empty());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn posting_source_yields_dates() {
        let mut builder = LedgerBuilder::new();
        builder
            .record(transfer("1", "Income:Sales", "Assets:Cash", dec!(1)))
            .unwrap();
        let ledger = builder.finalize();
        let dated: Vec<_> = ledger.dated_postings().collect();
        assert_eq!(dated.len(), 2);
        assert!(dated.iter().all(|(d, _)| *d == NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }
}
