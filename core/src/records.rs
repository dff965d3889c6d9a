//! Raw CSV rows and the validated samples derived from them.
//!
//! This module provides:
//! - [`RawRow`], a column-name keyed view of one CSV row exactly as it was read
//! - [`Sample`], the typed record every downstream stage works on
//! - [`parse_rows`], the presence filter that turns raw rows into a [`SampleSeries`]
//! - CSV ingestion helpers ([`read_raw_rows`], [`read_raw_rows_from_path`])
//!
//! A row is kept when all ten required columns are *present*; the values themselves are coerced
//! leniently and may end up as NaN. Rows missing any required column are dropped silently and
//! only show up in the [`ParseReport`] counts.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{FlightError, Result};

/// Columns that must be present on a row for it to become a [`Sample`].
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Ax",
    "Ay",
    "Az",
    "Mx",
    "My",
    "Mz",
    "lon",
    "lat",
    "Pressure",
    "Temperature",
];
/// Optional timestamp column.
pub const DATETIME_COLUMN: &str = "datetime";

/// One CSV row keyed by column name.
///
/// Only the columns the row actually carries are stored, so a short row simply lacks its trailing
/// columns. An empty cell is still *present*.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        RawRow::default()
    }
    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        RawRow {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
    pub fn has_required_columns(&self) -> bool {
        REQUIRED_COLUMNS.iter().all(|c| self.fields.contains_key(*c))
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A validated sensor record.
///
/// `altitude` is filled in by [`crate::altitude::apply_altitude`] once the reference pressure of
/// the series is known; freshly parsed samples carry `0.0`. `timestamp` is epoch milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Acceleration, sensor x axis (g)
    pub ax: f64,
    /// Acceleration, sensor y axis (g)
    pub ay: f64,
    /// Acceleration, sensor z axis (g)
    pub az: f64,
    /// Magnetic field, sensor x axis (µT)
    pub mx: f64,
    /// Magnetic field, sensor y axis (µT)
    pub my: f64,
    /// Magnetic field, sensor z axis (µT)
    pub mz: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Latitude in degrees
    pub lat: f64,
    /// Barometric pressure (hPa)
    pub pressure: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Altitude relative to the reference pressure (m)
    pub altitude: f64,
    /// Epoch milliseconds, when the row carried a parseable `datetime`
    pub timestamp: Option<i64>,
}

impl Sample {
    /// Convert a raw row, or `None` when any required column is missing.
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        if !row.has_required_columns() {
            return None;
        }
        let num = |c: &str| row.get(c).map(coerce_f64).unwrap_or(f64::NAN);
        Some(Sample {
            ax: num("Ax"),
            ay: num("Ay"),
            az: num("Az"),
            mx: num("Mx"),
            my: num("My"),
            mz: num("Mz"),
            lon: num("lon"),
            lat: num("lat"),
            pressure: num("Pressure"),
            temperature: num("Temperature"),
            altitude: 0.0,
            timestamp: row.get(DATETIME_COLUMN).and_then(parse_timestamp),
        })
    }
}

/// Row accounting for one parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
}

impl ParseReport {
    /// Combine the reports of two consecutive chunks.
    pub fn merge(self, other: ParseReport) -> ParseReport {
        ParseReport {
            total_rows: self.total_rows + other.total_rows,
            kept_rows: self.kept_rows + other.kept_rows,
            dropped_rows: self.dropped_rows + other.dropped_rows,
        }
    }
}

/// Time-ordered samples; insertion order is the original row order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleSeries {
    pub samples: Vec<Sample>,
    pub report: ParseReport,
}

impl SampleSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Apply the presence filter to a slice of rows, preserving order.
pub fn parse_rows(rows: &[RawRow]) -> SampleSeries {
    let samples: Vec<Sample> = rows.iter().filter_map(Sample::from_raw).collect();
    let report = ParseReport {
        total_rows: rows.len(),
        kept_rows: samples.len(),
        dropped_rows: rows.len() - samples.len(),
    };
    debug!(
        "parsed {} rows: kept {}, dropped {}",
        report.total_rows, report.kept_rows, report.dropped_rows
    );
    SampleSeries { samples, report }
}

/// Coerce a cell to `f64` the lenient way: the longest leading numeric prefix wins.
///
/// Surrounding whitespace is ignored, `"Infinity"` (optionally signed) is accepted and anything
/// without a leading number becomes NaN.
pub fn coerce_f64(raw: &str) -> f64 {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parse a `datetime` cell into epoch milliseconds.
///
/// Timestamps without an offset are taken as UTC. A bare integer is read as epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok();
    }
    None
}

/// Read every data row of a CSV stream with a header row.
///
/// Records are read flexibly, so a row with fewer cells than the header simply lacks the trailing
/// columns.
pub fn read_raw_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(FlightError::MissingHeader);
    }
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(RawRow::from_pairs(headers.iter().zip(record.iter())));
    }
    debug!("read {} raw rows ({} columns)", rows.len(), headers.len());
    Ok(rows)
}

/// Open a CSV file and read its rows; see [`read_raw_rows`].
pub fn read_raw_rows_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>> {
    let file = File::open(path)?;
    read_raw_rows(file)
}
