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

//! Import pipeline.
//!
//! The [`Engine`] drives one batch: records are read from a [`RecordSource`],
//! dispatched to the first matching rule, folded into a [`LedgerBuilder`] and
//! handed to a [`TransactionSink`].
//!
//! # Processing
//!
//! - **Transform**: pure per-record work, run as a parallel map.
//! - **Fold**: sequential, in source order, so output is deterministic.
//! - **Failures**: a record that cannot be read, transformed or written is
//!   counted and kept in the [`ProcessingSummary`]; the batch continues.
//! - **Skips**: a record no rule accepts is counted as skipped, not failed.
//!
//! Only a malformed source (e.g. missing required columns) or a sink that
//! cannot finish stops the batch.

use crate::account::AccountName;
use crate::error::{ConfigurationError, ProcessingError, ValidationError};
use crate::ledger::{Ledger, LedgerBuilder};
use crate::rules::RuleSet;
use crate::sink::TransactionSink;
use crate::source::{Record, RecordSource};
use crate::transaction::Transaction;
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

/// A record that did not make it into the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// Zero-based position in the source.
    pub index: usize,
    pub error: ProcessingError,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.index + 1, self.error)
    }
}

/// Counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub records_processed: usize,
    pub transactions_successful: usize,
    pub transactions_failed: usize,
    pub records_skipped: usize,
    pub accounts_created: usize,
    pub errors: Vec<RecordError>,
}

impl ProcessingSummary {
    /// No record failed. Skips do not count.
    pub fn is_clean(&self) -> bool {
        self.transactions_failed == 0
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} transactions, {} failed, {} skipped, {} accounts",
            self.records_processed,
            self.transactions_successful,
            self.transactions_failed,
            self.records_skipped,
            self.accounts_created
        )
    }
}

/// Result of a batch that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub ledger: Ledger,
    pub summary: ProcessingSummary,
}

struct Discard;

impl TransactionSink for Discard {
    fn write_transaction(&mut self, _: &Transaction) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn write_account_definition(&mut self, _: &AccountName) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }
}

/// Batch importer over a fixed rule set.
///
/// # Invariants
///
/// - Every transaction in the resulting ledger passed [`Transaction::build`].
/// - Transaction ids in the ledger are unique.
/// - Transactions appear in source order.
#[derive(Debug)]
pub struct Engine {
    rules: RuleSet,
}

impl Engine {
    /// # Errors
    ///
    /// [`ConfigurationError::EmptyRuleSet`] if `rules` has no rules.
    pub fn new(rules: RuleSet) -> Result<Self, ConfigurationError> {
        if rules.is_empty() {
            return Err(ConfigurationError::EmptyRuleSet);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Transforms one record with the first rule that accepts it.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::NoMatchingRule`] - no rule accepts the record.
    /// - Whatever the matching rule reports.
    pub fn transform(&self, record: &dyn Record) -> Result<Transaction, ProcessingError> {
        let rule = self
            .rules
            .first_match(record)
            .ok_or(ProcessingError::NoMatchingRule)?;
        rule.transform(record)
    }

    /// Builds a ledger without writing it anywhere.
    pub fn build_ledger<S: RecordSource>(&self, source: &S) -> Result<ProcessingOutcome, ProcessingError> {
        self.process(source, &mut Discard)
    }

    /// Runs one batch from `source` into `sink`.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::Validation`] - the source failed
    ///   [`validate_format`](RecordSource::validate_format).
    /// - Any error from writing account definitions or finalizing the sink.
    ///
    /// Per-record failures are not errors; they are reported in the summary.
    pub fn process<S, K>(&self, source: &S, sink: &mut K) -> Result<ProcessingOutcome, ProcessingError>
    where
        S: RecordSource,
        K: TransactionSink + ?Sized,
    {
        source.validate_format()?;

        let records: Vec<Result<S::Record, ProcessingError>> = source.records().collect();
        let outcomes: Vec<Result<Transaction, ProcessingError>> = records
            .into_par_iter()
            .map(|record| record.and_then(|record| self.transform(&record)))
            .collect();

        let mut summary = ProcessingSummary {
            records_processed: outcomes.len(),
            ..ProcessingSummary::default()
        };
        let mut builder = LedgerBuilder::new();
        builder.declare_accounts(self.rules.required_accounts());

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let result = outcome.and_then(|transaction| {
                if builder.contains(transaction.id()) {
                    return Err(ValidationError::DuplicateTransaction(transaction.id().clone()).into());
                }
                sink.write_transaction(&transaction)?;
                builder.record(transaction)?;
                Ok(())
            });

            match result {
                Ok(()) => summary.transactions_successful += 1,
                Err(ProcessingError::NoMatchingRule) => {
                    debug!(record = index, "no rule applies, skipping");
                    summary.records_skipped += 1;
                }
                Err(error) => {
                    warn!(record = index, %error, "record rejected");
                    summary.transactions_failed += 1;
                    summary.errors.push(RecordError { index, error });
                }
            }
        }

        let ledger = builder.finalize();
        for account in ledger.accounts() {
            sink.write_account_definition(account)?;
        }
        sink.finalize()?;

        summary.accounts_created = ledger.accounts().len();
        info!(
            records = summary.records_processed,
            successful = summary.transactions_successful,
            failed = summary.transactions_failed,
            skipped = summary.records_skipped,
            accounts = summary.accounts_created,
            "batch processed"
        );

        Ok(ProcessingOutcome { ledger, summary })
    }
}
