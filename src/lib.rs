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

//! # Ledger Import
//!
//! This library turns bank statements and sales registers into a balanced,
//! VAT-aware double-entry ledger, and reconciles ledgers against each other
//! and against external totals.
//!
//! ## Core Components
//!
//! - [`Transaction`]: Balanced, single-currency set of [`Posting`]s
//! - [`TransformationRule`]: Turns a source [`Record`] into a transaction
//!   ([`PaymentRule`], [`SaleRule`], [`CategoryRule`])
//! - [`Engine`]: Runs a batch from a [`RecordSource`] into a [`TransactionSink`]
//! - [`reconcile`]: Totals, zero-sum check, duplicate detection, reports
//!
//! ## Example
//!
//! ```
//! use ledger_import_rs::{Engine, FieldRecord, MemorySource, config::ImportConfig};
//! use ledger_import_rs::{AccountName, Amount, zero_sum_check};
//! use rust_decimal_macros::dec;
//!
//! let rules = ImportConfig::default().sale_rules().unwrap();
//! let engine = Engine::new(rules).unwrap();
//!
//! let source = MemorySource::new(vec![
//!     FieldRecord::new()
//!         .with("date", "2024-03-01")
//!         .with("amount", "118.00")
//!         .with("customer", "Acme Corp")
//!         .with("payment_method", "ნაღდი"),
//! ]);
//! let outcome = engine.build_ledger(&source).unwrap();
//!
//! let vat: AccountName = "Liabilities:VAT:Output:Acme-Corp".parse().unwrap();
//! assert_eq!(outcome.ledger.balance(&vat), Amount::new(dec!(-18.00)));
//! assert!(zero_sum_check(&outcome.ledger));
//! ```
//!
//! ## Concurrency
//!
//! Records are transformed in parallel with rayon; the ledger is assembled
//! sequentially in source order, so results do not depend on scheduling.

pub mod account;
mod amount;
mod base;
pub mod config;
mod engine;
pub mod error;
mod ledger;
mod namer;
pub mod reconcile;
pub mod rules;
mod sink;
mod source;
mod transaction;
mod vat;

pub use account::{AccountName, AccountType};
pub use amount::{Amount, IntoAmount, make_amount};
pub use base::{Currency, TransactionId};
pub use engine::{Engine, ProcessingOutcome, ProcessingSummary, RecordError};
pub use error::{ConfigurationError, ProcessingError, ValidationError};
pub use ledger::{Ledger, LedgerBuilder};
pub use namer::{MAX_SEGMENT_CHARS, customer_account, normalize_entity_name, receivables_account};
pub use reconcile::{
    AccountDiff, AmountStats, Comparison, Diagnosis, DuplicateAmount, PostingSource,
    ReconciliationReport, compare_totals, cross_check_counts, find_duplicate_amounts,
    per_account_totals, zero_sum_check,
};
pub use rules::{
    CategoryRule, NonCashRouting, PaymentChannel, PaymentMethodClassifier, PaymentRule, RuleSet,
    SaleAccounts, SaleRule, TransformationRule,
};
pub use sink::{AccountOpen, LedgerEntry, LedgerWriter, ParsedLedger, TransactionSink, read_ledger};
pub use source::{CsvSource, FieldRecord, MemorySource, Record, RecordSource, parse_date};
pub use transaction::{BALANCE_TOLERANCE, Posting, Transaction, build_transaction};
pub use vat::{VatRate, VatSplit, split_inclusive_total};
