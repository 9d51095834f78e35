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

use clap::{Parser, Subcommand};
use ledger_import_rs::config::ImportConfig;
use ledger_import_rs::{
    AccountName, Amount, ConfigurationError, CsvSource, Engine, LedgerWriter, ProcessingError,
    ProcessingSummary, ReconciliationReport, ValidationError, read_ledger,
};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Ledger Import - Build and check double-entry ledgers
///
/// Converts bank statements and sales registers (CSV) into a plain-text
/// ledger and reconciles ledgers against external totals.
#[derive(Parser, Debug)]
#[command(name = "ledger-import-rs")]
#[command(about = "VAT-aware double-entry import and reconciliation", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import customer payments from a bank statement
    ///
    /// Each row credits the customer's receivable and debits the bank.
    Payments(ImportArgs),
    /// Import a VAT-inclusive sales register
    ///
    /// Each row is split into net revenue and output VAT per customer.
    Sales(ImportArgs),
    /// Import a bank statement of income and expenses
    ///
    /// Each signed row is booked to an account chosen by description keyword.
    Statement(ImportArgs),
    /// Reconcile one account of a ledger file against a known total
    ///
    /// Exits with status 2 when the account does not reconcile.
    Reconcile(ReconcileArgs),
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// Path to the CSV export
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON configuration (accounts, VAT rate, column names)
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Write the ledger here instead of stdout
    #[arg(long, short, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ReconcileArgs {
    /// Ledger file to check
    #[arg(value_name = "LEDGER")]
    ledger: PathBuf,

    /// Account whose postings are reconciled
    #[arg(long)]
    account: String,

    /// Total the account should reach, e.g. from the bank statement
    #[arg(long)]
    expected_total: String,

    /// Number of source records behind the account
    #[arg(long)]
    source_count: usize,

    /// Largest acceptable difference between totals
    #[arg(long, default_value = "0.01")]
    tolerance: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot render report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportKind {
    Payments,
    Sales,
    Statement,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let result = match args.command {
        Command::Payments(import) => run_import(ImportKind::Payments, &import),
        Command::Sales(import) => run_import(ImportKind::Sales, &import),
        Command::Statement(import) => run_import(ImportKind::Statement, &import),
        Command::Reconcile(reconcile) => run_reconcile(&reconcile),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_import(kind: ImportKind, args: &ImportArgs) -> Result<bool, CliError> {
    let config = match &args.config {
        Some(path) => ImportConfig::from_path(path)?,
        None => ImportConfig::default(),
    };
    let input = File::open(&args.input).map_err(io_error(&args.input))?;

    let summary = match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(io_error(path))?;
            import_records(kind, input, &config, BufWriter::new(file))?
        }
        None => import_records(kind, input, &config, io::stdout().lock())?,
    };

    for line in summary_lines(&summary) {
        eprintln!("{line}");
    }
    Ok(true)
}

/// Per-record failures, then the batch totals.
fn summary_lines(summary: &ProcessingSummary) -> Vec<String> {
    summary
        .errors
        .iter()
        .map(|error| format!("Failed {error}"))
        .chain(std::iter::once(format!("Processed {summary}")))
        .collect()
}

fn run_reconcile(args: &ReconcileArgs) -> Result<bool, CliError> {
    let text = std::fs::read_to_string(&args.ledger).map_err(io_error(&args.ledger))?;
    let report = reconcile_ledger(&text, args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(report.is_reconciled())
}

/// Runs one import from CSV `input` and writes the ledger to `output`.
///
/// # Errors
///
/// Fails on bad configuration, unreadable input, missing required columns or
/// a failed write. Individual bad rows are reported in the summary instead.
fn import_records<R: Read, W: Write>(
    kind: ImportKind,
    input: R,
    config: &ImportConfig,
    output: W,
) -> Result<ProcessingSummary, CliError> {
    let fields = &config.fields;
    let (rules, required) = match kind {
        ImportKind::Payments => (
            config.payment_rules()?,
            vec![&fields.date, &fields.amount, &fields.customer],
        ),
        ImportKind::Sales => (
            config.sale_rules()?,
            vec![&fields.date, &fields.amount, &fields.customer],
        ),
        ImportKind::Statement => (config.statement_rules()?, vec![&fields.date, &fields.amount]),
    };
    let engine = Engine::new(rules)?;

    let source = config
        .configure_source(CsvSource::from_reader(input)?)
        .with_required_fields(required.into_iter().map(String::as_str));

    let mut sink = LedgerWriter::new(output, config.open_date, config.currency()?);
    let outcome = engine.process(&source, &mut sink)?;
    Ok(outcome.summary)
}

fn reconcile_ledger(text: &str, args: &ReconcileArgs) -> Result<ReconciliationReport, CliError> {
    let ledger = read_ledger(text)?;
    let account: AccountName = args.account.parse()?;
    let expected_total = Amount::parse_loose(&args.expected_total)?;
    let tolerance = Amount::parse(&args.tolerance)?;

    Ok(ReconciliationReport::build(
        &ledger,
        &account,
        expected_total,
        args.source_count,
        tolerance,
    ))
}
