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

//! Raw record input.
//!
//! Rules only ever see a [`Record`]: a bag of named text fields. Where the
//! fields come from is the business of a [`RecordSource`]. Two are provided:
//!
//! - [`MemorySource`]: records already in memory (tests, embedding).
//! - [`CsvSource`]: a CSV export held in memory, re-read on every pass.

use crate::error::{ProcessingError, ValidationError};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A raw input row with named fields.
pub trait Record {
    fn get_field(&self, name: &str) -> Option<&str>;

    /// Field value with surrounding whitespace removed; `None` when blank.
    fn non_blank(&self, name: &str) -> Option<&str> {
        self.get_field(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Owned record backed by a sorted map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    fields: BTreeMap<String, String>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Record for FieldRecord {
    fn get_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A finite, restartable supply of records.
///
/// Every call to [`records`](RecordSource::records) starts again from the
/// first record.
pub trait RecordSource {
    type Record: Record + Send + Sync;

    /// Checks the overall shape (e.g. required columns) before any record is read.
    fn validate_format(&self) -> Result<(), ValidationError>;

    fn records(&self) -> Box<dyn Iterator<Item = Result<Self::Record, ProcessingError>> + '_>;
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<FieldRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<FieldRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemorySource {
    type Record = FieldRecord;

    fn validate_format(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn records(&self) -> Box<dyn Iterator<Item = Result<FieldRecord, ProcessingError>> + '_> {
        Box::new(self.records.iter().cloned().map(Ok))
    }
}

/// CSV export held in memory.
///
/// Headers are trimmed and optionally renamed (e.g. from the spreadsheet's
/// Georgian column titles to the field names the rules use). Rows may be
/// short; missing cells are simply absent from the record.
#[derive(Debug, Clone)]
pub struct CsvSource {
    data: Vec<u8>,
    delimiter: u8,
    rename: HashMap<String, String>,
    required: Vec<String>,
}

impl CsvSource {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            delimiter: b',',
            rename: HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ProcessingError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProcessingError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Maps source column titles to field names.
    pub fn with_column_map<K, V>(mut self, map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.rename = map.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Field names that must be present, checked by [`RecordSource::validate_format`].
    pub fn with_required_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.required = fields.into_iter().map(Into::into).collect();
        self
    }

    fn reader(&self) -> csv::Reader<&[u8]> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(self.data.as_slice())
    }

    fn field_names(&self, headers: &StringRecord) -> Vec<String> {
        headers
            .iter()
            .map(|h| self.rename.get(h).cloned().unwrap_or_else(|| h.to_string()))
            .collect()
    }
}

impl RecordSource for CsvSource {
    type Record = FieldRecord;

    fn validate_format(&self) -> Result<(), ValidationError> {
        let mut reader = self.reader();
        let headers = reader
            .headers()
            .map_err(|_| ValidationError::MissingColumns(self.required.clone()))?;
        let names = self.field_names(headers);

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|field| !names.contains(field))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns(missing))
        }
    }

    fn records(&self) -> Box<dyn Iterator<Item = Result<FieldRecord, ProcessingError>> + '_> {
        let mut reader = self.reader();
        let names = match reader.headers() {
            Ok(headers) => self.field_names(headers),
            Err(err) => return Box::new(std::iter::once(Err(err.into()))),
        };

        Box::new(reader.into_records().map(move |row| -> Result<FieldRecord, ProcessingError> {
            let row = row?;
            Ok(names
                .iter()
                .zip(row.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect())
        }))
    }
}

/// Parses the date layouts found in bank and sales exports.
///
/// Accepted: `2024-03-01`, `2024-03-01 14:22:05`, `2024-03-01T14:22:05`,
/// `01.03.2024`, `01/03/2024` (day first).
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
        .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}
