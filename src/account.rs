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

//! Hierarchical account names.
//!
//! Accounts are colon-delimited paths rooted at one of the five
//! [`AccountType`]s, e.g. `Assets:Receivables:Acme-Corp`.
//!
//! # Example
//!
//! ```
//! use ledger_import_rs::{AccountName, AccountType};
//!
//! let account: AccountName = "Income:Sales".parse().unwrap();
//! assert_eq!(account.account_type(), AccountType::Income);
//! assert_eq!(account.child("Acme-Corp").unwrap().as_str(), "Income:Sales:Acme-Corp");
//! ```

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Assets,
        AccountType::Liabilities,
        AccountType::Equity,
        AccountType::Income,
        AccountType::Expenses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "Assets",
            Self::Liabilities => "Liabilities",
            Self::Equity => "Equity",
            Self::Income => "Income",
            Self::Expenses => "Expenses",
        }
    }

    pub fn from_prefix(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == segment)
    }

    /// True for accounts where a positive posting increases the balance.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, Self::Assets | Self::Expenses)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated account name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName {
    name: String,
    account_type: AccountType,
}

impl AccountName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let invalid = |reason| ValidationError::InvalidAccountName {
            name: name.to_string(),
            reason,
        };

        let mut segments = name.split(':');
        let root = segments.next().unwrap_or_default();
        let account_type = AccountType::from_prefix(root).ok_or_else(|| invalid("unknown account type"))?;

        for segment in segments {
            validate_segment(segment).map_err(invalid)?;
        }

        Ok(Self {
            name: name.to_string(),
            account_type,
        })
    }

    /// Appends one segment below this account.
    pub fn child(&self, segment: &str) -> Result<Self, ValidationError> {
        validate_segment(segment).map_err(|reason| ValidationError::InvalidAccountName {
            name: format!("{}:{}", self.name, segment),
            reason,
        })?;
        Ok(Self {
            name: format!("{}:{}", self.name, segment),
            account_type: self.account_type,
        })
    }

    /// Appends a segment already known to be valid, such as the output of
    /// [`normalize_entity_name`](crate::normalize_entity_name).
    pub(crate) fn child_unchecked(&self, segment: String) -> Self {
        debug_assert!(
            validate_segment(&segment).is_ok(),
            "Invariant violated: invalid account segment {segment:?}"
        );
        Self {
            name: format!("{}:{}", self.name, segment),
            account_type: self.account_type,
        }
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split(':')
    }

    /// Last segment, e.g. the customer part of a receivables account.
    pub fn leaf(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(self.name.as_str())
    }

    /// True when `self` equals `ancestor` or sits anywhere below it.
    pub fn is_within(&self, ancestor: &AccountName) -> bool {
        self.name == ancestor.name
            || (self.name.starts_with(&ancestor.name)
                && self.name[ancestor.name.len()..].starts_with(':'))
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if !segment.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err("segments may only contain letters, digits and hyphens");
    }
    Ok(())
}

impl FromStr for AccountName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AccountName> for String {
    fn from(value: AccountName) -> Self {
        value.name
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountName {
        AccountName::new(name).unwrap()
    }

    #[test]
    fn parses_each_account_type() {
        for account_type in AccountType::ALL {
            let name = format!("{}:Sub", account_type);
            assert_eq!(account(&name).account_type(), account_type);
        }
    }

    #[test]
    fn root_only_account_is_valid() {
        assert_eq!(account("Assets").account_type(), AccountType::Assets);
    }

    #[test]
    fn debit_normal_types() {
        assert!(AccountType::Assets.is_debit_normal());
        assert!(AccountType::Expenses.is_debit_normal());
        assert!(!AccountType::Liabilities.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
        assert!(!AccountType::Income.is_debit_normal());
    }

    #[test]
    fn rejects_unknown_prefix() {
        let err = AccountName::new("Revenue:Sales").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidAccountName {
                name: "Revenue:Sales".to_string(),
                reason: "unknown account type",
            }
        );
        assert!(AccountName::new("assets:Bank").is_err());
        assert!(AccountName::new("").is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(AccountName::new("Assets::Bank").is_err());
        assert!(AccountName::new("Assets:Bank:").is_err());
    }

    #[test]
    fn rejects_illegal_characters() {
        assert!(AccountName::new("Assets:Bank Account").is_err());
        assert!(AccountName::new("Assets:Bank_TBC").is_err());
        assert!(AccountName::new("Assets:Bank(TBC)").is_err());
    }

    #[test]
    fn accepts_georgian_segments() {
        let name = account("Income:Sales:შპს-ალფა");
        assert_eq!(name.leaf(), "შპს-ალფა");
    }

    #[test]
    fn child_appends_segment() {
        let base = account("Assets:Receivables");
        let child = base.child("Acme-Corp").unwrap();
        assert_eq!(child.as_str(), "Assets:Receivables:Acme-Corp");
        assert_eq!(child.account_type(), AccountType::Assets);
        assert!(base.child("").is_err());
        assert!(base.child("a:b").is_err());
    }

    #[test]
    fn is_within_respects_segment_boundaries() {
        let receivables = account("Assets:Receivables");
        assert!(account("Assets:Receivables:Acme").is_within(&receivables));
        assert!(receivables.is_within(&receivables));
        assert!(!account("Assets:ReceivablesOld").is_within(&receivables));
        assert!(!account("Assets:Cash").is_within(&receivables));
    }

    #[test]
    fn orders_lexicographically_by_name() {
        let mut names = vec![account("Income:Sales"), account("Assets:Cash"), account("Assets:Bank")];
        names.sort();
        let sorted: Vec<&str> = names.iter().map(AccountName::as_str).collect();
        assert_eq!(sorted, vec!["Assets:Bank", "Assets:Cash", "Income:Sales"]);
    }
}
