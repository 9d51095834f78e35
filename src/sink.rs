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

//! Plain-text ledger output and read-back.
//!
//! The format written by [`LedgerWriter`]:
//!
//! ```text
//! 2021-01-01 open Assets:Cash GEL
//! 2021-01-01 open Income:Sales GEL
//!
//! 2024-03-01 * "Cash sale to Acme"
//!     Assets:Cash  118.00 GEL
//!     Income:Sales:Acme  -100.00 GEL
//!     Liabilities:VAT:Output:Acme  -18.00 GEL
//! ```
//!
//! [`read_ledger`] parses the same format back without checking balance, so a
//! damaged file can still be handed to the reconciliation checks.

use crate::account::AccountName;
use crate::amount::Amount;
use crate::base::Currency;
use crate::error::ProcessingError;
use crate::reconcile::PostingSource;
use crate::transaction::{Posting, Transaction};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::Write;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Destination for the transactions of one run.
pub trait TransactionSink {
    fn write_transaction(&mut self, transaction: &Transaction) -> Result<(), ProcessingError>;

    fn write_account_definition(&mut self, account: &AccountName) -> Result<(), ProcessingError>;

    /// Flushes everything collected so far. Called once at the end of a run.
    fn finalize(&mut self) -> Result<(), ProcessingError>;
}

/// Writes a plain-text ledger.
///
/// Output is buffered until [`finalize`](TransactionSink::finalize) so that
/// account openings, which must come first, can be sorted.
#[derive(Debug)]
pub struct LedgerWriter<W: Write> {
    writer: W,
    open_date: NaiveDate,
    currency: Currency,
    accounts: BTreeSet<AccountName>,
    transactions: Vec<Transaction>,
}

impl<W: Write> LedgerWriter<W> {
    /// `open_date` and `currency` are used for every `open` directive.
    pub fn new(writer: W, open_date: NaiveDate, currency: Currency) -> Self {
        Self {
            writer,
            open_date,
            currency,
            accounts: BTreeSet::new(),
            transactions: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TransactionSink for LedgerWriter<W> {
    fn write_transaction(&mut self, transaction: &Transaction) -> Result<(), ProcessingError> {
        self.transactions.push(transaction.clone());
        Ok(())
    }

    fn write_account_definition(&mut self, account: &AccountName) -> Result<(), ProcessingError> {
        self.accounts.insert(account.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ProcessingError> {
        let opened = !self.accounts.is_empty();
        for account in std::mem::take(&mut self.accounts) {
            writeln!(
                self.writer,
                "{} open {} {}",
                self.open_date.format(DATE_FORMAT),
                account,
                self.currency
            )?;
        }

        for (index, transaction) in std::mem::take(&mut self.transactions).iter().enumerate() {
            if index > 0 || opened {
                writeln!(self.writer)?;
            }
            writeln!(
                self.writer,
                "{} * \"{}\"",
                transaction.date().format(DATE_FORMAT),
                escape(transaction.description())
            )?;
            for posting in transaction.postings() {
                writeln!(
                    self.writer,
                    "    {}  {} {}",
                    posting.account(),
                    posting.amount(),
                    posting.currency()
                )?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// An `open` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOpen {
    pub date: NaiveDate,
    pub account: AccountName,
    pub currency: Option<Currency>,
}

/// A transaction as written, not necessarily balanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub description: String,
    pub postings: Vec<Posting>,
}

/// Ledger text parsed back into directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLedger {
    pub opens: Vec<AccountOpen>,
    pub entries: Vec<LedgerEntry>,
}

impl ParsedLedger {
    /// Opened accounts plus every account posted to.
    pub fn accounts(&self) -> BTreeSet<AccountName> {
        self.opens
            .iter()
            .map(|open| open.account.clone())
            .chain(
                self.entries
                    .iter()
                    .flat_map(|entry| entry.postings.iter().map(|p| p.account().clone())),
            )
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PostingSource for ParsedLedger {
    fn dated_postings(&self) -> Box<dyn Iterator<Item = (NaiveDate, &Posting)> + '_> {
        Box::new(
            self.entries
                .iter()
                .flat_map(|entry| entry.postings.iter().map(move |p| (entry.date, p))),
        )
    }
}

fn parse_date(line: usize, raw: &str) -> Result<NaiveDate, ProcessingError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ProcessingError::parse(line, format!("invalid date {raw:?}")))
}

fn parse_account(line: usize, raw: &str) -> Result<AccountName, ProcessingError> {
    AccountName::new(raw).map_err(|err| ProcessingError::parse(line, err.to_string()))
}

fn parse_currency(line: usize, raw: &str) -> Result<Currency, ProcessingError> {
    Currency::new(raw).map_err(|err| ProcessingError::parse(line, err.to_string()))
}

fn parse_posting(line: usize, text: &str) -> Result<Posting, ProcessingError> {
    let mut tokens = text.split_whitespace();
    let (Some(account), Some(amount), Some(currency), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ProcessingError::parse(
            line,
            "expected `<account> <amount> <currency>`",
        ));
    };

    let amount = Amount::parse(amount).map_err(|err| ProcessingError::parse(line, err.to_string()))?;
    Posting::new(
        parse_account(line, account)?,
        amount,
        parse_currency(line, currency)?,
    )
    .map_err(|err| ProcessingError::parse(line, err.to_string()))
}

fn parse_description(line: usize, raw: &str) -> Result<String, ProcessingError> {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(unescape)
        .ok_or_else(|| ProcessingError::parse(line, "description must be quoted"))
}

/// Parses ledger text in the format [`LedgerWriter`] produces.
///
/// Lines starting with `;` are comments, as is anything after a `;` on a
/// posting line. Indented `key: value` lines are metadata and skipped.
/// Balance is not checked.
///
/// # Errors
///
/// [`ProcessingError::Parse`] with the 1-based line number of the first
/// line that cannot be understood.
pub fn read_ledger(text: &str) -> Result<ParsedLedger, ProcessingError> {
    let mut ledger = ParsedLedger::default();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        if raw.starts_with(char::is_whitespace) {
            let body = trimmed.split(';').next().unwrap_or_default().trim();
            if body.is_empty() || body.split_whitespace().next().is_some_and(|t| t.ends_with(':')) {
                continue;
            }
            let posting = parse_posting(line, body)?;
            let entry = ledger
                .entries
                .last_mut()
                .ok_or_else(|| ProcessingError::parse(line, "posting outside of a transaction"))?;
            entry.postings.push(posting);
            continue;
        }

        let (date, rest) = trimmed
            .split_once(char::is_whitespace)
            .ok_or_else(|| ProcessingError::parse(line, "expected a directive after the date"))?;
        let date = parse_date(line, date)?;
        let rest = rest.trim_start();

        if let Some(open) = rest.strip_prefix("open ") {
            let mut tokens = open.split_whitespace();
            let account = tokens
                .next()
                .ok_or_else(|| ProcessingError::parse(line, "open without account"))?;
            let currency = tokens.next().map(|c| parse_currency(line, c)).transpose()?;
            ledger.opens.push(AccountOpen {
                date,
                account: parse_account(line, account)?,
                currency,
            });
        } else if let Some(description) = rest.strip_prefix('*').or_else(|| rest.strip_prefix('!')) {
            ledger.entries.push(LedgerEntry {
                date,
                description: parse_description(line, description)?,
                postings: Vec::new(),
            });
        } else {
            return Err(ProcessingError::parse(line, format!("unknown directive {rest:?}")));
        }
    }

    Ok(ledger)
}
