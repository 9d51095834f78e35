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

//! Benchmarks for the import pipeline.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - VAT splitting and entity-name normalization
//! - Batch imports at increasing sizes
//! - Thread scaling of the parallel transform
//! - Ledger write, read-back and reconciliation

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ledger_import_rs::config::ImportConfig;
use ledger_import_rs::{
    AccountName, Amount, Currency, Engine, FieldRecord, Ledger, LedgerWriter, MemorySource,
    ReconciliationReport, TransactionSink, normalize_entity_name, read_ledger,
    split_inclusive_total,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::hint::black_box;

// =============================================================================
// Helper Functions
// =============================================================================

const METHODS: [&str; 4] = ["ნაღდი", "Bank transfer", "card", ""];

fn make_sales(count: usize) -> Vec<FieldRecord> {
    (0..count)
        .map(|i| {
            FieldRecord::new()
                .with("id", format!("s{i}"))
                .with("date", format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1))
                .with("amount", Decimal::new(1_000 + (i as i64 * 37) % 100_000, 2).to_string())
                .with("customer", format!("შპს კლიენტი {}", i % 500))
                .with("payment_method", METHODS[i % METHODS.len()])
        })
        .collect()
}

fn sales_engine() -> Engine {
    Engine::new(ImportConfig::default().sale_rules().unwrap()).unwrap()
}

fn write_ledger(ledger: &Ledger) -> String {
    let mut writer = LedgerWriter::new(
        Vec::new(),
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        Currency::new("GEL").unwrap(),
    );
    for account in ledger.accounts() {
        writer.write_account_definition(account).unwrap();
    }
    for tx in ledger.transactions() {
        writer.write_transaction(tx).unwrap();
    }
    writer.finalize().unwrap();
    String::from_utf8(writer.into_inner()).unwrap()
}

// =============================================================================
// Building Blocks
// =============================================================================

fn bench_vat_split(c: &mut Criterion) {
    c.bench_function("vat_split", |b| {
        b.iter(|| split_inclusive_total(black_box(Amount::new(dec!(1234.56))), black_box(dec!(0.18))))
    });
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_entity_name");

    for (label, raw) in [
        ("latin", "  Acme (Tbilisi) Ltd. "),
        ("georgian", "შპს \"ალფა\" - თბილისი"),
        ("long", "International Trading and Logistics Company of the South Caucasus Region"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(label), raw, |b, raw| {
            b.iter(|| normalize_entity_name(black_box(raw)))
        });
    }
    group.finish();
}

// =============================================================================
// Batch Imports
// =============================================================================

fn bench_build_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_ledger");
    let engine = sales_engine();

    for count in [100, 1_000, 10_000].iter() {
        let source = MemorySource::new(make_sales(*count));
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| black_box(engine.build_ledger(source).unwrap()))
        });
    }
    group.finish();
}

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let engine = sales_engine();
    let source = MemorySource::new(make_sales(20_000));

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| pool.install(|| black_box(engine.build_ledger(&source).unwrap())))
            },
        );
    }
    group.finish();
}

// =============================================================================
// Output and Reconciliation
// =============================================================================

fn bench_write_and_read(c: &mut Criterion) {
    let ledger = sales_engine()
        .build_ledger(&MemorySource::new(make_sales(5_000)))
        .unwrap()
        .ledger;
    let text = write_ledger(&ledger);

    let mut group = c.benchmark_group("ledger_text");
    group.throughput(Throughput::Elements(ledger.len() as u64));
    group.bench_function("write", |b| b.iter(|| black_box(write_ledger(&ledger))));
    group.bench_function("read", |b| b.iter(|| black_box(read_ledger(&text).unwrap())));
    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let ledger = sales_engine()
        .build_ledger(&MemorySource::new(make_sales(10_000)))
        .unwrap()
        .ledger;
    let bank = AccountName::new("Assets:Bank:Checking:TBC").unwrap();

    c.bench_function("reconciliation_report", |b| {
        b.iter(|| {
            black_box(ReconciliationReport::build(
                &ledger,
                &bank,
                Amount::new(dec!(1000000)),
                7_500,
                Amount::new(dec!(0.01)),
            ))
        })
    });
}

criterion_group!(building_blocks, bench_vat_split, bench_normalize);
criterion_group!(batches, bench_build_ledger, bench_thread_scaling);
criterion_group!(output, bench_write_and_read, bench_reconcile);
criterion_main!(building_blocks, batches, output);
