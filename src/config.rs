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

//! Import configuration.
//!
//! [`ImportConfig`] is plain data, deserialized from JSON with every field
//! optional. Nothing is checked on load; [`ImportConfig::payment_rules`] and
//! friends validate it into rules, so a bad account name or VAT rate surfaces
//! as a [`ConfigurationError`] before any record is read.
//!
//! ```
//! use ledger_import_rs::config::ImportConfig;
//!
//! let config = ImportConfig::from_json_str(r#"{ "vat_rate": "0.18", "currency": "GEL" }"#).unwrap();
//! assert_eq!(config.sale_rules().unwrap().len(), 1);
//! ```

use crate::account::{AccountName, AccountType};
use crate::base::Currency;
use crate::error::ConfigurationError;
use crate::rules::{
    CategoryRule, NonCashRouting, PaymentMethodClassifier, PaymentRule, RecordFields, RecordKind,
    RuleSet, SaleAccounts, SaleRule,
};
use crate::source::CsvSource;
use crate::vat::VatRate;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_open_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default()
}

/// Account names, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub bank: String,
    pub cash: String,
    pub receivables: String,
    pub sales: String,
    pub vat: String,
    /// Counter-account for uncategorised outflows.
    pub expense_default: String,
    /// Counter-account for uncategorised inflows.
    pub income_default: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            bank: "Assets:Bank:Checking:TBC".to_string(),
            cash: "Assets:Cash".to_string(),
            receivables: "Assets:Receivables".to_string(),
            sales: "Income:Sales".to_string(),
            vat: "Liabilities:VAT:Output".to_string(),
            expense_default: CategoryRule::DEFAULT_EXPENSE_ACCOUNT.to_string(),
            income_default: CategoryRule::DEFAULT_INCOME_ACCOUNT.to_string(),
        }
    }
}

/// Payment-method keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub cash: Vec<String>,
    pub bank: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            cash: PaymentMethodClassifier::DEFAULT_CASH_INDICATORS
                .map(String::from)
                .to_vec(),
            bank: PaymentMethodClassifier::DEFAULT_BANK_INDICATORS
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Statement keyword and the account it books to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub keyword: String,
    pub account: String,
}

fn default_categories() -> Vec<CategoryConfig> {
    CategoryRule::DEFAULT_KEYWORDS
        .iter()
        .map(|(keyword, account)| CategoryConfig {
            keyword: keyword.to_string(),
            account: account.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// ISO code shared by every posting.
    pub currency: String,
    /// VAT rate as a fraction (`"0.18"`).
    pub vat_rate: Decimal,
    /// Date written on `open` directives.
    pub open_date: NaiveDate,
    pub accounts: AccountsConfig,
    pub indicators: IndicatorConfig,
    pub non_cash_routing: NonCashRouting,
    /// Statement keywords in search order; replaces the defaults when given.
    pub categories: Vec<CategoryConfig>,
    /// Field names the rules read.
    pub fields: RecordFields,
    /// CSV header to field name, applied before rules see a record.
    pub columns: BTreeMap<String, String>,
    /// Restricts the payment rule to one kind of record.
    pub payment_kind: Option<RecordKind>,
    /// Restricts the sale rule to one kind of record.
    pub sale_kind: Option<RecordKind>,
    /// Restricts the category rule to one kind of record.
    pub category_kind: Option<RecordKind>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            currency: "GEL".to_string(),
            vat_rate: VatRate::STANDARD.value(),
            open_date: default_open_date(),
            accounts: AccountsConfig::default(),
            indicators: IndicatorConfig::default(),
            non_cash_routing: NonCashRouting::default(),
            categories: default_categories(),
            fields: RecordFields::default(),
            columns: BTreeMap::new(),
            payment_kind: None,
            sale_kind: None,
            category_kind: None,
        }
    }
}

impl ImportConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|err| ConfigurationError::Load(err.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| ConfigurationError::Load(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn currency(&self) -> Result<Currency, ConfigurationError> {
        Currency::new(&self.currency).map_err(|_| ConfigurationError::InvalidCurrency(self.currency.clone()))
    }

    pub fn vat_rate(&self) -> Result<VatRate, ConfigurationError> {
        VatRate::new(self.vat_rate).map_err(|_| ConfigurationError::InvalidVatRate(self.vat_rate))
    }

    /// Applies the configured header renames to a CSV source.
    pub fn configure_source(&self, source: CsvSource) -> CsvSource {
        source.with_column_map(self.columns.clone())
    }

    pub fn payment_rule(&self) -> Result<PaymentRule, ConfigurationError> {
        let mut rule = PaymentRule::new(
            account(&self.accounts.bank)?,
            account(&self.accounts.receivables)?,
            self.currency()?,
        )
        .with_fields(self.fields.clone());
        if let Some(kind) = &self.payment_kind {
            rule = rule.with_kind(kind.clone());
        }
        Ok(rule)
    }

    pub fn sale_rule(&self) -> Result<SaleRule, ConfigurationError> {
        let accounts = SaleAccounts {
            cash: account(&self.accounts.cash)?,
            bank: account(&self.accounts.bank)?,
            receivables: account(&self.accounts.receivables)?,
            sales: account(&self.accounts.sales)?,
            vat: account(&self.accounts.vat)?,
        };
        let classifier = PaymentMethodClassifier::new(&self.indicators.cash, &self.indicators.bank);

        let mut rule = SaleRule::new(accounts, self.currency()?, self.vat_rate()?)
            .with_classifier(classifier)
            .with_routing(self.non_cash_routing)
            .with_fields(self.fields.clone());
        if let Some(kind) = &self.sale_kind {
            rule = rule.with_kind(kind.clone());
        }
        Ok(rule)
    }

    pub fn category_rule(&self) -> Result<CategoryRule, ConfigurationError> {
        let mut rule = CategoryRule::new(
            account(&self.accounts.bank)?,
            account(&self.accounts.expense_default)?,
            account(&self.accounts.income_default)?,
            self.currency()?,
        )
        .with_fields(self.fields.clone());
        for category in &self.categories {
            rule = rule.with_keyword(&category.keyword, account(&category.account)?);
        }
        if let Some(kind) = &self.category_kind {
            rule = rule.with_kind(kind.clone());
        }
        Ok(rule)
    }

    /// Rules for a bank statement of customer payments.
    pub fn payment_rules(&self) -> Result<RuleSet, ConfigurationError> {
        Ok(RuleSet::new().with(self.payment_rule()?))
    }

    /// Rules for a sales register.
    pub fn sale_rules(&self) -> Result<RuleSet, ConfigurationError> {
        Ok(RuleSet::new().with(self.sale_rule()?))
    }

    /// Rules for a categorised bank statement of income and expenses.
    pub fn statement_rules(&self) -> Result<RuleSet, ConfigurationError> {
        Ok(RuleSet::new().with(self.category_rule()?))
    }

    /// Payment and sale rules, payments first, for sources mixing record kinds.
    ///
    /// The category rule is appended last when `category_kind` is set.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::AmbiguousRules`] unless both `payment_kind` and
    /// `sale_kind` are set, since otherwise every record would go to the
    /// payment rule.
    pub fn mixed_rules(&self) -> Result<RuleSet, ConfigurationError> {
        if self.payment_kind.is_none() || self.sale_kind.is_none() {
            return Err(ConfigurationError::AmbiguousRules(
                "mixed sources need both payment_kind and sale_kind".to_string(),
            ));
        }
        let mut rules = RuleSet::new().with(self.payment_rule()?).with(self.sale_rule()?);
        if self.category_kind.is_some() {
            rules.push(self.category_rule()?);
        }
        Ok(rules)
    }
}

fn account(raw: &str) -> Result<AccountName, ConfigurationError> {
    let prefix = raw.trim().split(':').next().unwrap_or_default();
    if AccountType::from_prefix(prefix).is_none() {
        return Err(ConfigurationError::UnknownAccountType(raw.to_string()));
    }
    AccountName::new(raw).map_err(|source| ConfigurationError::InvalidAccount {
        name: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FieldRecord, Record, RecordSource};
    use rust_decimal_macros::dec;

    #[test]
    fn empty_json_gives_defaults() {
        let config = ImportConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.vat_rate().unwrap(), VatRate::STANDARD);
        assert_eq!(config.currency().unwrap().as_str(), "GEL");
        assert_eq!(config.open_date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ImportConfig::from_json_str(
            r#"{
                "currency": "USD",
                "vat_rate": "0.2",
                "open_date": "2023-06-01",
                "accounts": { "bank": "Assets:Bank:Checking:BOG" },
                "indicators": { "cash": ["till"], "bank": ["wire"] },
                "non_cash_routing": "receivables",
                "fields": { "customer": "buyer" },
                "columns": { "თანხა": "amount" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.vat_rate, dec!(0.2));
        assert_eq!(config.accounts.bank, "Assets:Bank:Checking:BOG");
        assert_eq!(config.accounts.cash, "Assets:Cash");
        assert_eq!(config.non_cash_routing, NonCashRouting::Receivables);
        assert_eq!(config.fields.customer, "buyer");
        assert_eq!(config.fields.amount, "amount");
        assert_eq!(config.columns["თანხა"], "amount");

        let rules = config.sale_rules().unwrap();
        let record = FieldRecord::new()
            .with("date", "2023-06-02")
            .with("amount", "120")
            .with("buyer", "Acme")
            .with("payment_method", "till");
        let tx = rules.first_match(&record).unwrap().transform(&record).unwrap();
        assert_eq!(tx.postings()[0].account().as_str(), "Assets:Cash");
        assert_eq!(tx.postings()[0].currency().as_str(), "USD");
        assert_eq!(tx.postings()[1].amount().value(), dec!(-100.00));
    }

    #[test]
    fn unknown_account_prefix_is_rejected() {
        let config = ImportConfig::from_json_str(r#"{ "accounts": { "bank": "Bank:Checking" } }"#).unwrap();
        assert_eq!(
            config.payment_rules().unwrap_err(),
            ConfigurationError::UnknownAccountType("Bank:Checking".to_string())
        );
    }

    #[test]
    fn malformed_account_is_rejected() {
        let config = ImportConfig::from_json_str(r#"{ "accounts": { "sales": "Income::Sales" } }"#).unwrap();
        assert!(matches!(
            config.sale_rules(),
            Err(ConfigurationError::InvalidAccount { .. })
        ));
    }

    #[test]
    fn bad_currency_and_rate_are_rejected() {
        let config = ImportConfig::from_json_str(r#"{ "currency": "lari" }"#).unwrap();
        assert_eq!(
            config.payment_rules().unwrap_err(),
            ConfigurationError::InvalidCurrency("lari".to_string())
        );

        let config = ImportConfig::from_json_str(r#"{ "vat_rate": "-1" }"#).unwrap();
        assert_eq!(
            config.sale_rules().unwrap_err(),
            ConfigurationError::InvalidVatRate(dec!(-1))
        );
    }

    #[test]
    fn invalid_json_is_a_load_error() {
        assert!(matches!(
            ImportConfig::from_json_str("{ not json"),
            Err(ConfigurationError::Load(_))
        ));
        assert!(matches!(
            ImportConfig::from_path("/nonexistent/config.json"),
            Err(ConfigurationError::Load(_))
        ));
    }

    #[test]
    fn mixed_rules_require_kinds() {
        assert!(matches!(
            ImportConfig::default().mixed_rules(),
            Err(ConfigurationError::AmbiguousRules(_))
        ));
        let only_payments =
            ImportConfig::from_json_str(r#"{ "payment_kind": { "field": "type", "value": "payment" } }"#).unwrap();
        assert!(matches!(
            only_payments.mixed_rules(),
            Err(ConfigurationError::AmbiguousRules(_))
        ));

        let config = ImportConfig::from_json_str(
            r#"{
                "payment_kind": { "field": "type", "value": "payment" },
                "sale_kind": { "field": "type", "value": "sale" }
            }"#,
        )
        .unwrap();
        let rules = config.mixed_rules().unwrap();
        assert_eq!(rules.len(), 2);

        let sale = FieldRecord::new()
            .with("type", "SALE")
            .with("amount", "10")
            .with("customer", "Acme");
        assert_eq!(rules.first_match(&sale).map(|r| r.name()), Some("sale"));
    }

    #[test]
    fn mixed_rules_append_category_rule_when_kinded() {
        let config = ImportConfig::from_json_str(
            r#"{
                "payment_kind": { "field": "type", "value": "payment" },
                "sale_kind": { "field": "type", "value": "sale" },
                "category_kind": { "field": "type", "value": "statement" }
            }"#,
        )
        .unwrap();
        let rules = config.mixed_rules().unwrap();
        assert_eq!(format!("{rules:?}"), "[\"payment\", \"sale\", \"category\"]");

        let line = FieldRecord::new().with("type", "statement").with("amount", "-4");
        assert_eq!(rules.first_match(&line).map(|r| r.name()), Some("category"));
    }

    #[test]
    fn default_categories_cover_georgian_keywords() {
        let rule = ImportConfig::default().category_rule().unwrap();
        let amount = crate::amount::Amount::new(dec!(-8));
        assert_eq!(rule.counter_account("სადილი, საკვები", amount).as_str(), "Expenses:Food");
        assert_eq!(rule.counter_account("Morning latte", amount).as_str(), "Expenses:Food:Coffee");
        assert_eq!(rule.counter_account("???", amount).as_str(), "Expenses:Unknown");
        assert_eq!(
            rule.counter_account("???", -amount).as_str(),
            "Income:Unknown"
        );
    }

    #[test]
    fn configured_categories_replace_defaults() {
        let config = ImportConfig::from_json_str(
            r#"{
                "categories": [{ "keyword": "fuel", "account": "Expenses:Car:Fuel" }],
                "accounts": { "expense_default": "Expenses:Misc" }
            }"#,
        )
        .unwrap();
        let rule = config.category_rule().unwrap();
        let amount = crate::amount::Amount::new(dec!(-60));
        assert_eq!(rule.counter_account("FUEL station", amount).as_str(), "Expenses:Car:Fuel");
        assert_eq!(rule.counter_account("salary", amount).as_str(), "Expenses:Misc");

        let bad = ImportConfig::from_json_str(
            r#"{ "categories": [{ "keyword": "x", "account": "Spending:X" }] }"#,
        )
        .unwrap();
        assert_eq!(
            bad.statement_rules().unwrap_err(),
            ConfigurationError::UnknownAccountType("Spending:X".to_string())
        );
    }

    #[test]
    fn column_map_is_applied_to_csv() {
        let config = ImportConfig::from_json_str(r#"{ "columns": { "თანხა": "amount" } }"#).unwrap();
        let source = config.configure_source(CsvSource::from_bytes("თანხა,customer\n10,Acme\n"));
        let record = source.records().next().unwrap().unwrap();
        assert_eq!(record.get_field("amount"), Some("10"));
    }
}
