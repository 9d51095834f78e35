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

//! Reconciliation of posting sets.
//!
//! Everything here works on a [`PostingSource`]: either a [`Ledger`] built in
//! this run or a [`ParsedLedger`] read back from text. The checks answer
//! questions like:
//!
//! - Do the imported bank credits add up to the spreadsheet total?
//! - Are there more bank postings than source rows, and which amounts repeat?
//! - Does the whole ledger still sum to zero?
//! - Which account balances differ between two ledgers?
//!
//! Duplicate amounts are a reporting signal only. Recurring identical
//! payments are legitimate, so nothing is removed automatically.
//!
//! [`Ledger`]: crate::Ledger
//! [`ParsedLedger`]: crate::ParsedLedger

use crate::account::AccountName;
use crate::amount::Amount;
use crate::base::Currency;
use crate::transaction::{BALANCE_TOLERANCE, Posting};
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Anything that can enumerate dated postings.
pub trait PostingSource {
    fn dated_postings(&self) -> Box<dyn Iterator<Item = (NaiveDate, &Posting)> + '_>;

    fn postings(&self) -> Box<dyn Iterator<Item = &Posting> + '_> {
        Box::new(self.dated_postings().map(|(_, posting)| posting))
    }
}

/// Sum of every posting grouped by account.
pub fn per_account_totals(source: &impl PostingSource) -> BTreeMap<AccountName, Amount> {
    let mut totals: BTreeMap<AccountName, Amount> = BTreeMap::new();
    for posting in source.postings() {
        *totals.entry(posting.account().clone()).or_default() += posting.amount();
    }
    totals
}

/// Sum of every posting grouped by currency.
pub fn per_currency_totals(source: &impl PostingSource) -> BTreeMap<Currency, Amount> {
    let mut totals: BTreeMap<Currency, Amount> = BTreeMap::new();
    for posting in source.postings() {
        *totals.entry(posting.currency().clone()).or_default() += posting.amount();
    }
    totals
}

/// True when every currency's postings sum to within [`BALANCE_TOLERANCE`] of zero.
///
/// The allowance is fixed: it does not grow with the size of the ledger.
pub fn zero_sum_check(source: &impl PostingSource) -> bool {
    per_currency_totals(source)
        .values()
        .all(|total| total.value().abs() <= BALANCE_TOLERANCE)
}

/// Outcome of comparing an expected total with an actual one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Comparison {
    Equal,
    /// Different, but no further apart than the tolerance.
    Within { delta: Amount },
    /// `percent` is `None` when the expected total is zero.
    Divergent {
        delta: Amount,
        percent: Option<Decimal>,
    },
}

impl Comparison {
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::Divergent { .. })
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Within { delta } => write!(f, "within tolerance (delta {delta})"),
            Self::Divergent {
                delta,
                percent: Some(percent),
            } => write!(f, "divergent by {delta} ({percent}%)"),
            Self::Divergent {
                delta,
                percent: None,
            } => write!(f, "divergent by {delta} (percent undefined)"),
        }
    }
}

/// Compares `actual` against the reference `expected`.
///
/// `delta = actual - expected`; the percentage is relative to `expected`.
pub fn compare_totals(expected: Amount, actual: Amount, tolerance: Amount) -> Comparison {
    let delta = actual - expected;
    if delta.is_zero() {
        return Comparison::Equal;
    }
    if delta.abs() <= tolerance.abs() {
        return Comparison::Within { delta };
    }

    let percent = delta
        .value()
        .checked_div(expected.value())
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .map(|p| p.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero));
    Comparison::Divergent { delta, percent }
}

/// An amount that occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateAmount {
    pub amount: Amount,
    pub count: usize,
}

/// Amounts occurring more than once, most frequent first.
///
/// Ties are ordered by ascending amount so reports are stable.
pub fn find_duplicate_amounts(amounts: impl IntoIterator<Item = Amount>) -> Vec<DuplicateAmount> {
    let mut counts: HashMap<Amount, usize> = HashMap::new();
    for amount in amounts {
        *counts.entry(amount).or_default() += 1;
    }

    let mut duplicates: Vec<DuplicateAmount> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(amount, count)| DuplicateAmount { amount, count })
        .collect();
    duplicates.sort_by(|a, b| b.count.cmp(&a.count).then(a.amount.cmp(&b.amount)));
    duplicates
}

/// Record count in the source versus entries in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "difference", rename_all = "snake_case")]
pub enum Diagnosis {
    Matched,
    LedgerHasExtra(usize),
    LedgerMissing(usize),
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "counts match"),
            Self::LedgerHasExtra(n) => write!(f, "ledger has {n} extra entries (possible duplicates)"),
            Self::LedgerMissing(n) => write!(f, "ledger is missing {n} entries"),
        }
    }
}

pub fn cross_check_counts(source_count: usize, ledger_count: usize) -> Diagnosis {
    match ledger_count.cmp(&source_count) {
        std::cmp::Ordering::Equal => Diagnosis::Matched,
        std::cmp::Ordering::Greater => Diagnosis::LedgerHasExtra(ledger_count - source_count),
        std::cmp::Ordering::Less => Diagnosis::LedgerMissing(source_count - ledger_count),
    }
}

/// Amounts of every posting against exactly `account`, in ledger order.
pub fn account_amounts(source: &impl PostingSource, account: &AccountName) -> Vec<Amount> {
    source
        .postings()
        .filter(|p| p.account() == account)
        .map(Posting::amount)
        .collect()
}

/// Totals of accounts whose name contains `needle`, e.g. `"Bank"` or `"Receivables"`.
pub fn totals_matching<'a>(
    totals: &'a BTreeMap<AccountName, Amount>,
    needle: &str,
) -> BTreeMap<&'a AccountName, Amount> {
    totals
        .iter()
        .filter(|(account, _)| account.as_str().contains(needle))
        .map(|(account, amount)| (account, *amount))
        .collect()
}

/// Adds two per-account total maps together.
pub fn merge_totals(
    left: &BTreeMap<AccountName, Amount>,
    right: &BTreeMap<AccountName, Amount>,
) -> BTreeMap<AccountName, Amount> {
    let mut merged = left.clone();
    for (account, amount) in right {
        *merged.entry(account.clone()).or_default() += *amount;
    }
    merged
}

/// One account whose balance differs between two ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDiff {
    pub account: AccountName,
    pub left: Option<Amount>,
    pub right: Option<Amount>,
    /// `right - left`, treating a missing side as zero.
    pub delta: Amount,
}

/// Accounts present on only one side, or whose balances differ by more than `tolerance`.
pub fn diff_accounts(
    left: &BTreeMap<AccountName, Amount>,
    right: &BTreeMap<AccountName, Amount>,
    tolerance: Amount,
) -> Vec<AccountDiff> {
    let mut accounts: Vec<&AccountName> = left.keys().chain(right.keys()).collect();
    accounts.sort();
    accounts.dedup();

    accounts
        .into_iter()
        .filter_map(|account| {
            let l = left.get(account).copied();
            let r = right.get(account).copied();
            let delta = r.unwrap_or_default() - l.unwrap_or_default();
            let one_sided = l.is_none() || r.is_none();
            (one_sided || delta.abs() > tolerance.abs()).then(|| AccountDiff {
                account: account.clone(),
                left: l,
                right: r,
                delta,
            })
        })
        .collect()
}

/// Descriptive statistics over a set of amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountStats {
    pub count: usize,
    pub total: Amount,
    pub min: Amount,
    pub max: Amount,
    pub mean: Amount,
    pub median: Amount,
}

impl AmountStats {
    /// `None` for an empty input.
    pub fn from_amounts(amounts: &[Amount]) -> Option<Self> {
        if amounts.is_empty() {
            return None;
        }
        let mut sorted = amounts.to_vec();
        sorted.sort();

        let count = sorted.len();
        let total: Amount = sorted.iter().sum();
        let mean = Amount::new(total.value() / Decimal::from(count));
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            Amount::new((sorted[count / 2 - 1].value() + sorted[count / 2].value()) / dec!(2))
        };

        Some(Self {
            count,
            total,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
        })
    }
}

/// Per-month (`YYYY-MM`) totals of postings against `account`.
pub fn monthly_totals(source: &impl PostingSource, account: &AccountName) -> BTreeMap<String, Amount> {
    let mut months: BTreeMap<String, Amount> = BTreeMap::new();
    for (date, posting) in source.dated_postings() {
        if posting.account() == account {
            let key = format!("{:04}-{:02}", date.year(), date.month());
            *months.entry(key).or_default() += posting.amount();
        }
    }
    months
}

/// Everything known about one account measured against an external source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub account: AccountName,
    pub expected_total: Amount,
    pub ledger_total: Amount,
    pub comparison: Comparison,
    pub source_count: usize,
    pub posting_count: usize,
    pub diagnosis: Diagnosis,
    pub duplicates: Vec<DuplicateAmount>,
    pub stats: Option<AmountStats>,
    pub monthly: BTreeMap<String, Amount>,
    pub ledger_balanced: bool,
}

impl ReconciliationReport {
    /// Reconciles the postings against `account` with a known total and record count.
    pub fn build(
        source: &impl PostingSource,
        account: &AccountName,
        expected_total: Amount,
        source_count: usize,
        tolerance: Amount,
    ) -> Self {
        let amounts = account_amounts(source, account);
        let ledger_total: Amount = amounts.iter().sum();

        Self {
            account: account.clone(),
            expected_total,
            ledger_total,
            comparison: compare_totals(expected_total, ledger_total, tolerance),
            source_count,
            posting_count: amounts.len(),
            diagnosis: cross_check_counts(source_count, amounts.len()),
            duplicates: find_duplicate_amounts(amounts.iter().copied()),
            stats: AmountStats::from_amounts(&amounts),
            monthly: monthly_totals(source, account),
            ledger_balanced: zero_sum_check(source),
        }
    }

    /// True when totals agree, counts match and the ledger balances.
    pub fn is_reconciled(&self) -> bool {
        self.comparison.is_acceptable() && self.diagnosis == Diagnosis::Matched && self.ledger_balanced
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Reconciliation of {} ===", self.account)?;
        writeln!(f, "Expected total: {}", self.expected_total)?;
        writeln!(f, "Ledger total:   {}", self.ledger_total)?;
        writeln!(f, "Totals:         {}", self.comparison)?;
        writeln!(
            f,
            "Counts:         {} source records, {} postings: {}",
            self.source_count, self.posting_count, self.diagnosis
        )?;
        writeln!(
            f,
            "Ledger balance: {}",
            if self.ledger_balanced { "sums to zero" } else { "DOES NOT sum to zero" }
        )?;

        if let Some(stats) = &self.stats {
            writeln!(
                f,
                "Amounts:        min {} / max {} / mean {} / median {}",
                stats.min, stats.max, stats.mean, stats.median
            )?;
        }

        if !self.monthly.is_empty() {
            writeln!(f, "Monthly totals:")?;
            for (month, total) in &self.monthly {
                writeln!(f, "  {month}: {total}")?;
            }
        }

        if !self.duplicates.is_empty() {
            writeln!(f, "Repeated amounts:")?;
            for duplicate in self.duplicates.iter().take(10) {
                writeln!(f, "  {} appears {} times", duplicate.amount, duplicate.count)?;
            }
        }
        Ok(())
    }
}
