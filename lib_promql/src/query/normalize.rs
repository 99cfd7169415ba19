//! # Result Normalizer
//!
//! Turns the two PromQL result shapes into one rectangular table.
//!
//! - **vector**: one record per series.
//! - **matrix**: one record per sample, series after series, samples in the
//!   order the server sent them.
//!
//! The label columns are fixed on the first series (schema columns if given,
//! otherwise that series' labels in wire order) and every later series is
//! projected onto the same list. A series lacking one of those labels is an
//! error; nothing is padded.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{PromqlError, Result};
use crate::query::envelope::Envelope;
use crate::query::schema::{CellValue, Schema};
use crate::query::series::{Sample, Series};

/// One output row: `[timestamp, (datetime), labels..., value]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Raw epoch seconds as sent by the server.
    pub timestamp: f64,
    /// Present only when the schema names a timezone.
    #[serde(serialize_with = "serialize_datetime", skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Tz>>,
    /// Label values, in `Table::label_columns` order.
    pub labels: Vec<String>,
    /// The sample value, cast when the schema asks for it.
    pub value: CellValue,
}

/// Normalized output: resolved column names plus the records.
///
/// Only `normalize` builds tables, so the column list and the label columns
/// always agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// `timestamp`, optionally `datetime`, the label columns, then `value`.
    pub columns: Vec<String>,
    /// One entry per vector series or per matrix sample.
    pub records: Vec<Record>,
    #[serde(skip)]
    label_columns: Vec<String>,
}

impl Table {
    fn new(label_columns: Vec<String>, with_datetime: bool, records: Vec<Record>) -> Self {
        let mut columns = Vec::with_capacity(label_columns.len() + 3);
        columns.push("timestamp".to_string());
        if with_datetime {
            columns.push("datetime".to_string());
        }
        columns.extend(label_columns.iter().cloned());
        columns.push("value".to_string());

        Self {
            columns,
            records,
            label_columns,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The projected label names, matching `Record::labels` position by position.
    pub fn label_columns(&self) -> &[String] {
        &self.label_columns
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Vector,
    Matrix,
}

/// Normalizes a query envelope into a table.
///
/// # Errors
/// - `NoData` when the envelope is not a success.
/// - `EmptyResult` when `result` has no entries.
/// - `UnsupportedResultType` for anything but `vector` and `matrix`.
/// - `MissingLabel`, `CastError`, `InvalidTimestamp`, `MalformedResult` for
///   structural problems in the data.
pub fn normalize(envelope: &Envelope, schema: Option<&Schema>) -> Result<Table> {
    let data = envelope.data().ok_or_else(|| PromqlError::NoData {
        status: envelope.status().to_string(),
    })?;

    let result = data.get("result");
    if result.and_then(Value::as_array).is_some_and(|r| r.is_empty()) {
        return Err(PromqlError::EmptyResult);
    }

    let shape = match envelope.result_type() {
        Some("vector") => Shape::Vector,
        Some("matrix") => Shape::Matrix,
        Some(other) => return Err(PromqlError::UnsupportedResultType(other.to_string())),
        None => return Err(PromqlError::UnsupportedResultType("<missing>".to_string())),
    };

    let entries = result
        .and_then(Value::as_array)
        .ok_or_else(|| PromqlError::MalformedResult {
            series: None,
            reason: "\"result\" is not an array".to_string(),
        })?;

    let default_schema = Schema::default();
    let schema = schema.unwrap_or(&default_schema);

    let mut label_columns: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let series = match shape {
            Shape::Vector => Series::from_vector_entry(index, entry)?,
            Shape::Matrix => Series::from_matrix_entry(index, entry)?,
        };

        let columns = label_columns.get_or_insert_with(|| {
            if schema.columns.is_empty() {
                series.label_names()
            } else {
                schema.columns.clone()
            }
        });

        let labels = project(&series, columns, index)?;
        for sample in &series.samples {
            records.push(make_record(sample, &labels, schema)?);
        }
    }

    let label_columns = label_columns.unwrap_or_default();
    tracing::debug!(
        result_type = envelope.result_type().unwrap_or_default(),
        series = entries.len(),
        records = records.len(),
        columns = ?label_columns,
        "normalized PromQL result"
    );

    Ok(Table::new(label_columns, schema.timezone.is_some(), records))
}

fn project(series: &Series, columns: &[String], index: usize) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|column| {
            series
                .label(column)
                .map(str::to_string)
                .ok_or_else(|| PromqlError::MissingLabel {
                    label: column.clone(),
                    series: index,
                })
        })
        .collect()
}

fn make_record(sample: &Sample, labels: &[String], schema: &Schema) -> Result<Record> {
    let datetime = schema
        .timezone
        .map(|tz| to_datetime(sample.timestamp, tz))
        .transpose()?;

    let value = match schema.cast {
        Some(cast) => cast.apply(&sample.value)?,
        None => CellValue::Text(sample.value.clone()),
    };

    Ok(Record {
        timestamp: sample.timestamp,
        datetime,
        labels: labels.to_vec(),
        value,
    })
}

/// Converts fractional epoch seconds to a zoned datetime.
pub fn to_datetime(timestamp: f64, tz: Tz) -> Result<DateTime<Tz>> {
    if !timestamp.is_finite() {
        return Err(PromqlError::InvalidTimestamp(timestamp));
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return Err(PromqlError::InvalidTimestamp(timestamp));
    }

    let utc = Utc
        .timestamp_opt(secs as i64, nanos)
        .single()
        .ok_or(PromqlError::InvalidTimestamp(timestamp))?;
    Ok(utc.with_timezone(&tz))
}

fn serialize_datetime<S: Serializer>(dt: &Option<DateTime<Tz>>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match dt {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}
