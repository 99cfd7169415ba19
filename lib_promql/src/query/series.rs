//! Typed views over the `result` entries of vector and matrix responses.

use serde_json::Value;

use crate::error::{PromqlError, Result};

/// One `[timestamp, "value"]` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the epoch, fractional part included.
    pub timestamp: f64,
    /// The value as sent on the wire (`"NaN"`, `"+Inf"` and `"-Inf"` included).
    pub value: String,
}

/// A label set and its samples. Labels keep the order the server sent them in.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// `(name, value)` pairs from the `metric` object.
    pub labels: Vec<(String, String)>,
    /// One sample for a vector entry, all of them for a matrix entry.
    pub samples: Vec<Sample>,
}

impl Series {
    /// Parses an instant-vector entry: `{"metric": {...}, "value": [ts, "v"]}`.
    pub fn from_vector_entry(index: usize, entry: &Value) -> Result<Self> {
        let labels = parse_metric(index, entry)?;
        let pair = entry
            .get("value")
            .ok_or_else(|| malformed(index, "missing \"value\""))?;
        let sample = parse_sample(index, pair)?;
        Ok(Series { labels, samples: vec![sample] })
    }

    /// Parses a range-matrix entry: `{"metric": {...}, "values": [[ts, "v"], ...]}`.
    pub fn from_matrix_entry(index: usize, entry: &Value) -> Result<Self> {
        let labels = parse_metric(index, entry)?;
        let values = entry
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(index, "missing \"values\" array"))?;
        let samples = values
            .iter()
            .map(|pair| parse_sample(index, pair))
            .collect::<Result<Vec<_>>>()?;
        Ok(Series { labels, samples })
    }

    /// Value of the label `name`, if the series carries it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Label names in wire order.
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|(k, _)| k.clone()).collect()
    }
}

fn parse_metric(index: usize, entry: &Value) -> Result<Vec<(String, String)>> {
    let metric = entry
        .get("metric")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(index, "missing \"metric\" object"))?;

    metric
        .iter()
        .map(|(name, value)| match value.as_str() {
            Some(v) => Ok((name.clone(), v.to_string())),
            None => Err(malformed(index, &format!("label {:?} is not a string", name))),
        })
        .collect()
}

fn parse_sample(index: usize, pair: &Value) -> Result<Sample> {
    let items = pair
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| malformed(index, "sample is not a [timestamp, value] pair"))?;

    let timestamp = items[0]
        .as_f64()
        .ok_or_else(|| malformed(index, "sample timestamp is not a number"))?;
    let value = items[1]
        .as_str()
        .ok_or_else(|| malformed(index, "sample value is not a string"))?
        .to_string();

    Ok(Sample { timestamp, value })
}

fn malformed(index: usize, reason: &str) -> PromqlError {
    PromqlError::MalformedResult {
        series: Some(index),
        reason: reason.to_string(),
    }
}
