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

//! Customer names to account segments.
//!
//! Business names arrive as untrusted free text, frequently in Georgian.
//! [`normalize_entity_name`] turns any of them into a segment that
//! [`AccountName`] accepts.
//!
//! # Example
//!
//! ```
//! use ledger_import_rs::{customer_account, normalize_entity_name, AccountName};
//!
//! assert_eq!(normalize_entity_name("  Acme (Tbilisi) Ltd. "), "Acme-Tbilisi-Ltd");
//!
//! let base: AccountName = "Income:Sales".parse().unwrap();
//! assert_eq!(customer_account(&base, "შპს ალფა").as_str(), "Income:Sales:შპს-ალფა");
//! ```

use crate::account::AccountName;

/// Longest segment produced, in characters.
pub const MAX_SEGMENT_CHARS: usize = 50;

/// Returned when nothing usable is left of the input.
pub const UNKNOWN_ENTITY: &str = "Unknown";

const CUSTOMER_MARKER: char = 'C';

fn is_georgian_letter(c: char) -> bool {
    ('ა'..='ჰ').contains(&c)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '(' | ')')
}

fn is_kept(c: char) -> bool {
    c.is_alphanumeric() || is_georgian_letter(c) || is_separator(c)
}

/// Canonical account segment for a business name. Never fails.
pub fn normalize_entity_name(raw: &str) -> String {
    let mut segment = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.trim().chars().filter(|c| is_kept(*c)) {
        if is_separator(c) {
            pending_separator = true;
            continue;
        }
        if pending_separator && !segment.is_empty() {
            segment.push('-');
        }
        pending_separator = false;
        segment.push(c);
    }

    if segment.chars().next().is_some_and(|c| !c.is_alphanumeric()) {
        segment.insert(0, CUSTOMER_MARKER);
    }

    let mut segment: String = segment.chars().take(MAX_SEGMENT_CHARS).collect();
    // Truncation can expose a separator at the end.
    while segment.ends_with('-') {
        segment.pop();
    }

    if segment.is_empty() {
        UNKNOWN_ENTITY.to_string()
    } else {
        segment
    }
}

/// `base` with the normalized entity appended as its last segment.
pub fn customer_account(base: &AccountName, entity: &str) -> AccountName {
    base.child_unchecked(normalize_entity_name(entity))
}

/// Receivables account for a customer, prefixed by the tax code when one is known.
///
/// The tax code keeps only alphanumerics and hyphens, so
/// `("Acme", Some("40-123/5"))` becomes `<base>:40-1235-Acme`.
pub fn receivables_account(base: &AccountName, customer: &str, tax_code: Option<&str>) -> AccountName {
    let code: String = tax_code
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    let code = code.trim_matches('-');

    if code.is_empty() {
        customer_account(base, customer)
    } else {
        customer_account(base, &format!("{code}-{customer}"))
    }
}
