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

//! Record-to-transaction rules.
//!
//! Every rule answers three questions about a [`Record`]:
//!
//! | Method | Question |
//! |--------|----------|
//! | [`applies_to`](TransformationRule::applies_to) | Is this record mine? |
//! | [`transform`](TransformationRule::transform) | What balanced transaction does it become? |
//! | [`required_accounts`](TransformationRule::required_accounts) | Which accounts must exist? |
//!
//! Three rules are provided:
//!
//! - [`PaymentRule`]: money arrives in the bank and settles a customer receivable.
//! - [`SaleRule`]: a VAT-inclusive sale, paid in cash or by bank (or on credit),
//!   split into net revenue and output VAT per customer.
//! - [`CategoryRule`]: a signed bank-statement line, booked to an income or
//!   expense account picked by keyword.
//!
//! A [`RuleSet`] keeps rules in registration order and dispatches each record
//! to the first rule that accepts it.

use crate::account::AccountName;
use crate::amount::Amount;
use crate::base::{Currency, TransactionId};
use crate::error::{ProcessingError, ValidationError};
use crate::namer::{customer_account, normalize_entity_name, receivables_account};
use crate::source::{Record, parse_date};
use crate::transaction::{Posting, Transaction};
use crate::vat::VatRate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Converts raw records into balanced transactions.
pub trait TransformationRule: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn applies_to(&self, record: &dyn Record) -> bool;

    fn transform(&self, record: &dyn Record) -> Result<Transaction, ProcessingError>;

    fn required_accounts(&self) -> BTreeSet<AccountName>;
}

/// Names of the record fields rules read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFields {
    pub id: String,
    pub date: String,
    pub amount: String,
    pub customer: String,
    pub tax_code: String,
    pub payment_method: String,
    pub description: String,
    pub category: String,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            date: "date".to_string(),
            amount: "amount".to_string(),
            customer: "customer".to_string(),
            tax_code: "tax_code".to_string(),
            payment_method: "payment_method".to_string(),
            description: "description".to_string(),
            category: "category".to_string(),
        }
    }
}

/// Restricts a rule to records whose `field` equals `value` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKind {
    pub field: String,
    pub value: String,
}

impl RecordKind {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, record: &dyn Record) -> bool {
        record
            .non_blank(&self.field)
            .is_some_and(|v| v.to_lowercase() == self.value.trim().to_lowercase())
    }
}

/// Where the money of a sale lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    Cash,
    Bank,
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cash => f.write_str("cash"),
            Self::Bank => f.write_str("bank"),
        }
    }
}

/// Keyword classifier over a free-text payment-method field.
///
/// Matching is a case-insensitive substring search. A cash indicator wins
/// only when no bank indicator appears in the same text; anything else,
/// including a blank or absent field, is [`PaymentChannel::Bank`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethodClassifier {
    cash_indicators: Vec<String>,
    bank_indicators: Vec<String>,
}

impl PaymentMethodClassifier {
    pub const DEFAULT_CASH_INDICATORS: [&'static str; 5] = ["ნაღდი", "ნაღ", "კეში", "cash", "ნაღდი ფული"];
    pub const DEFAULT_BANK_INDICATORS: [&'static str; 5] = ["bank", "transfer", "ბანკ", "გადარიცხვ", "card"];

    pub fn new<S: AsRef<str>>(
        cash_indicators: impl IntoIterator<Item = S>,
        bank_indicators: impl IntoIterator<Item = S>,
    ) -> Self {
        fn normalize<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            cash_indicators: normalize(cash_indicators),
            bank_indicators: normalize(bank_indicators),
        }
    }

    pub fn classify(&self, payment_method: Option<&str>) -> PaymentChannel {
        let Some(text) = payment_method.map(|t| t.trim().to_lowercase()) else {
            return PaymentChannel::Bank;
        };
        let mentions = |indicators: &[String]| indicators.iter().any(|i| text.contains(i.as_str()));

        if mentions(&self.cash_indicators) && !mentions(&self.bank_indicators) {
            PaymentChannel::Cash
        } else {
            PaymentChannel::Bank
        }
    }
}

impl Default for PaymentMethodClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CASH_INDICATORS, Self::DEFAULT_BANK_INDICATORS)
    }
}

/// Destination of sales that were not paid in cash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonCashRouting {
    /// Debit the bank account directly.
    #[default]
    Bank,
    /// Debit the customer's receivable; a later bank payment settles it.
    Receivables,
}

fn required_field<'a>(record: &'a dyn Record, field: &str) -> Result<&'a str, ProcessingError> {
    record
        .non_blank(field)
        .ok_or_else(|| ProcessingError::MissingField(field.to_string()))
}

fn positive_amount(record: &dyn Record, field: &str) -> Result<Amount, ProcessingError> {
    let amount = Amount::parse_loose(required_field(record, field)?)
        .map_err(|err| ProcessingError::invalid_field(field, err))?;
    if !amount.is_positive() {
        return Err(ProcessingError::invalid_field(
            field,
            ValidationError::NonPositiveAmount(amount.value()),
        ));
    }
    Ok(amount)
}

fn nonzero_amount(record: &dyn Record, field: &str) -> Result<Amount, ProcessingError> {
    let amount = Amount::parse_loose(required_field(record, field)?)
        .map_err(|err| ProcessingError::invalid_field(field, err))?;
    if amount.is_zero() {
        return Err(ProcessingError::invalid_field(field, ValidationError::ZeroAmount));
    }
    Ok(amount)
}

fn record_date(record: &dyn Record, field: &str) -> Result<NaiveDate, ProcessingError> {
    parse_date(required_field(record, field)?).map_err(|err| ProcessingError::invalid_field(field, err))
}

fn record_id(record: &dyn Record, field: &str) -> TransactionId {
    record
        .non_blank(field)
        .map(TransactionId::from)
        .unwrap_or_else(TransactionId::generate)
}

fn kind_matches(kind: &Option<RecordKind>, record: &dyn Record) -> bool {
    kind.as_ref().is_none_or(|k| k.matches(record))
}

/// Bank receipt settling a customer receivable.
///
/// `+amount` on the bank account, `-amount` on
/// `<receivables>:<tax code>-<customer>`.
#[derive(Debug, Clone)]
pub struct PaymentRule {
    bank_account: AccountName,
    receivables: AccountName,
    currency: Currency,
    fields: RecordFields,
    kind: Option<RecordKind>,
}

impl PaymentRule {
    pub fn new(bank_account: AccountName, receivables: AccountName, currency: Currency) -> Self {
        Self {
            bank_account,
            receivables,
            currency,
            fields: RecordFields::default(),
            kind: None,
        }
    }

    pub fn with_fields(mut self, fields: RecordFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl TransformationRule for PaymentRule {
    fn name(&self) -> &str {
        "payment"
    }

    fn applies_to(&self, record: &dyn Record) -> bool {
        kind_matches(&self.kind, record)
            && record.non_blank(&self.fields.amount).is_some()
            && record.non_blank(&self.fields.customer).is_some()
    }

    fn transform(&self, record: &dyn Record) -> Result<Transaction, ProcessingError> {
        let date = record_date(record, &self.fields.date)?;
        let amount = positive_amount(record, &self.fields.amount)?;
        let customer = required_field(record, &self.fields.customer)?;
        let tax_code = record.non_blank(&self.fields.tax_code);

        let receivable = receivables_account(&self.receivables, customer, tax_code);
        let description = match tax_code {
            Some(code) => format!(
                "Payment received from {} (Tax Code: {code})",
                normalize_entity_name(customer)
            ),
            None => format!("Payment received from {}", normalize_entity_name(customer)),
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("customer".to_string(), customer.to_string());
        if let Some(code) = tax_code {
            metadata.insert("tax_code".to_string(), code.to_string());
        }

        let postings = vec![
            Posting::new(self.bank_account.clone(), amount, self.currency.clone())?,
            Posting::new(receivable, -amount, self.currency.clone())?,
        ];
        Ok(Transaction::build(
            record_id(record, &self.fields.id),
            date,
            description,
            postings,
            metadata,
        )?)
    }

    fn required_accounts(&self) -> BTreeSet<AccountName> {
        BTreeSet::from([self.bank_account.clone(), self.receivables.clone()])
    }
}

/// Accounts a [`SaleRule`] posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleAccounts {
    pub cash: AccountName,
    pub bank: AccountName,
    pub receivables: AccountName,
    /// Base of per-customer revenue accounts.
    pub sales: AccountName,
    /// Base of per-customer output VAT accounts.
    pub vat: AccountName,
}

/// VAT-inclusive sale.
///
/// `+total` on cash, bank or the customer's receivable; `-net` on
/// `<sales>:<customer>`; `-tax` on `<vat>:<customer>`. Zero components are
/// left out, so a 0% rate yields a two-posting transaction.
#[derive(Debug, Clone)]
pub struct SaleRule {
    accounts: SaleAccounts,
    currency: Currency,
    rate: VatRate,
    classifier: PaymentMethodClassifier,
    routing: NonCashRouting,
    fields: RecordFields,
    kind: Option<RecordKind>,
}

impl SaleRule {
    pub fn new(accounts: SaleAccounts, currency: Currency, rate: VatRate) -> Self {
        Self {
            accounts,
            currency,
            rate,
            classifier: PaymentMethodClassifier::default(),
            routing: NonCashRouting::default(),
            fields: RecordFields::default(),
            kind: None,
        }
    }

    pub fn with_classifier(mut self, classifier: PaymentMethodClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_routing(mut self, routing: NonCashRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_fields(mut self, fields: RecordFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn debit_account(&self, channel: PaymentChannel, customer: &str, tax_code: Option<&str>) -> AccountName {
        match (channel, self.routing) {
            (PaymentChannel::Cash, _) => self.accounts.cash.clone(),
            (PaymentChannel::Bank, NonCashRouting::Bank) => self.accounts.bank.clone(),
            (PaymentChannel::Bank, NonCashRouting::Receivables) => {
                receivables_account(&self.accounts.receivables, customer, tax_code)
            }
        }
    }
}

impl TransformationRule for SaleRule {
    fn name(&self) -> &str {
        "sale"
    }

    fn applies_to(&self, record: &dyn Record) -> bool {
        kind_matches(&self.kind, record)
            && record.non_blank(&self.fields.amount).is_some()
            && record.non_blank(&self.fields.customer).is_some()
    }

    fn transform(&self, record: &dyn Record) -> Result<Transaction, ProcessingError> {
        let date = record_date(record, &self.fields.date)?;
        let total = positive_amount(record, &self.fields.amount)?;
        let customer = required_field(record, &self.fields.customer)?;
        let tax_code = record.non_blank(&self.fields.tax_code);
        let payment_method = record.non_blank(&self.fields.payment_method);

        let channel = self.classifier.classify(payment_method);
        let debit = self.debit_account(channel, customer, tax_code);
        let split = self.rate.split(total)?;

        let label = match (channel, self.routing) {
            (PaymentChannel::Cash, _) => "Cash sale",
            (PaymentChannel::Bank, NonCashRouting::Bank) => "Sale",
            (PaymentChannel::Bank, NonCashRouting::Receivables) => "Credit sale",
        };
        let description = format!("{label} to {}", normalize_entity_name(customer));

        let mut postings = vec![Posting::new(debit, total, self.currency.clone())?];
        for (base, part) in [(&self.accounts.sales, split.net), (&self.accounts.vat, split.tax)] {
            if !part.is_zero() {
                postings.push(Posting::new(
                    customer_account(base, customer),
                    -part,
                    self.currency.clone(),
                )?);
            }
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("customer".to_string(), customer.to_string());
        metadata.insert("channel".to_string(), channel.to_string());
        metadata.insert("vat_rate".to_string(), self.rate.to_string());
        if let Some(method) = payment_method {
            metadata.insert("payment_method".to_string(), method.to_string());
        }

        Ok(Transaction::build(
            record_id(record, &self.fields.id),
            date,
            description,
            postings,
            metadata,
        )?)
    }

    fn required_accounts(&self) -> BTreeSet<AccountName> {
        let non_cash = match self.routing {
            NonCashRouting::Bank => self.accounts.bank.clone(),
            NonCashRouting::Receivables => self.accounts.receivables.clone(),
        };
        BTreeSet::from([
            self.accounts.cash.clone(),
            non_cash,
            self.accounts.sales.clone(),
            self.accounts.vat.clone(),
        ])
    }
}

/// Signed bank-statement line booked against an income or expense account.
///
/// The asset account takes the signed amount and the counter-account the
/// opposite. The counter-account belongs to the first keyword found in the
/// description or category; with no keyword, outflows go to the expense
/// default and inflows to the income default.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    asset_account: AccountName,
    keywords: Vec<(String, AccountName)>,
    expense_default: AccountName,
    income_default: AccountName,
    currency: Currency,
    fields: RecordFields,
    kind: Option<RecordKind>,
}

impl CategoryRule {
    pub const DEFAULT_EXPENSE_ACCOUNT: &'static str = "Expenses:Unknown";
    pub const DEFAULT_INCOME_ACCOUNT: &'static str = "Income:Unknown";

    /// Searched in order; more specific keywords come first.
    pub const DEFAULT_KEYWORDS: [(&'static str, &'static str); 16] = [
        ("salary", "Income:Salary"),
        ("payroll", "Income:Salary"),
        ("ხელფასი", "Income:Salary"),
        ("refund", "Income:Refunds"),
        ("დაბრუნება", "Income:Refunds"),
        ("coffee", "Expenses:Food:Coffee"),
        ("latte", "Expenses:Food:Coffee"),
        ("restaurant", "Expenses:Food"),
        ("lunch", "Expenses:Food"),
        ("food", "Expenses:Food"),
        ("საკვები", "Expenses:Food"),
        ("taxi", "Expenses:Transport"),
        ("transport", "Expenses:Transport"),
        ("ტრანსპორტ", "Expenses:Transport"),
        ("subscription", "Expenses:Services:Subscriptions"),
        ("withdrawal", "Expenses:Cash"),
    ];

    pub fn new(
        asset_account: AccountName,
        expense_default: AccountName,
        income_default: AccountName,
        currency: Currency,
    ) -> Self {
        Self {
            asset_account,
            keywords: Vec::new(),
            expense_default,
            income_default,
            currency,
            fields: RecordFields::default(),
            kind: None,
        }
    }

    /// Appends a keyword; blank keywords are ignored.
    pub fn with_keyword(mut self, keyword: impl AsRef<str>, account: AccountName) -> Self {
        let keyword = keyword.as_ref().trim().to_lowercase();
        if !keyword.is_empty() {
            self.keywords.push((keyword, account));
        }
        self
    }

    pub fn with_fields(mut self, fields: RecordFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Counter-account for a line with this text and signed amount.
    pub fn counter_account(&self, text: &str, amount: Amount) -> &AccountName {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, account)| account)
            .unwrap_or(if amount.is_positive() {
                &self.income_default
            } else {
                &self.expense_default
            })
    }
}

impl TransformationRule for CategoryRule {
    fn name(&self) -> &str {
        "category"
    }

    fn applies_to(&self, record: &dyn Record) -> bool {
        kind_matches(&self.kind, record) && record.non_blank(&self.fields.amount).is_some()
    }

    fn transform(&self, record: &dyn Record) -> Result<Transaction, ProcessingError> {
        let date = record_date(record, &self.fields.date)?;
        let amount = nonzero_amount(record, &self.fields.amount)?;
        let description = record.non_blank(&self.fields.description);
        let category = record.non_blank(&self.fields.category);

        let text: Vec<&str> = description.into_iter().chain(category).collect();
        let counter = self.counter_account(&text.join(" "), amount).clone();

        let mut metadata = BTreeMap::new();
        if let Some(category) = category {
            metadata.insert("category".to_string(), category.to_string());
        }

        let postings = vec![
            Posting::new(self.asset_account.clone(), amount, self.currency.clone())?,
            Posting::new(counter, -amount, self.currency.clone())?,
        ];
        Ok(Transaction::build(
            record_id(record, &self.fields.id),
            date,
            description.unwrap_or("Bank transaction").to_string(),
            postings,
            metadata,
        )?)
    }

    fn required_accounts(&self) -> BTreeSet<AccountName> {
        let mut accounts = BTreeSet::from([
            self.asset_account.clone(),
            self.expense_default.clone(),
            self.income_default.clone(),
        ]);
        accounts.extend(self.keywords.iter().map(|(_, account)| account.clone()));
        accounts
    }
}

/// Ordered rules; registration order is dispatch priority.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn TransformationRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: impl TransformationRule + 'static) -> Self {
        self.push(rule);
        self
    }

    pub fn push(&mut self, rule: impl TransformationRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// First rule whose `applies_to` accepts the record.
    pub fn first_match(&self, record: &dyn Record) -> Option<&dyn TransformationRule> {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(record))
            .map(|rule| rule.as_ref())
    }

    /// Union of every rule's required accounts.
    pub fn required_accounts(&self) -> BTreeSet<AccountName> {
        self.rules.iter().flat_map(|rule| rule.required_accounts()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name()))
            .finish()
    }
}
