//! # Normalization Schema
//!
//! Caller-supplied projection and formatting instructions: which labels become
//! columns, which timezone the datetime column uses, and how sample values
//! are cast.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PromqlError, Result};

/// Conversion applied to every sample value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cast {
    /// `f64`, with `NaN` and the infinities accepted.
    #[serde(alias = "float", alias = "f64")]
    Numeric,
    /// The wire string, unchanged.
    #[serde(alias = "str")]
    String,
    /// `true`/`false`, or any number other than zero.
    #[serde(alias = "bool")]
    Boolean,
}

/// A sample value after casting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Uncast or string-cast value.
    Text(String),
    /// Numeric cast.
    Number(f64),
    /// Boolean cast.
    Bool(bool),
}

impl Cast {
    /// Converts a wire value. `NaN`, `+Inf` and `-Inf` are valid numbers.
    ///
    /// # Errors
    /// `CastError` naming the value when it does not convert.
    pub fn apply(self, raw: &str) -> Result<CellValue> {
        match self {
            Cast::String => Ok(CellValue::Text(raw.to_string())),
            Cast::Numeric => parse_number(raw)
                .map(CellValue::Number)
                .ok_or_else(|| self.error(raw)),
            Cast::Boolean => {
                let trimmed = raw.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    return Ok(CellValue::Bool(true));
                }
                if trimmed.eq_ignore_ascii_case("false") {
                    return Ok(CellValue::Bool(false));
                }
                match parse_number(raw) {
                    Some(n) if !n.is_nan() => Ok(CellValue::Bool(n != 0.0)),
                    _ => Err(self.error(raw)),
                }
            }
        }
    }

    fn error(self, raw: &str) -> PromqlError {
        PromqlError::CastError {
            value: raw.to_string(),
            cast: self.to_string(),
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    match raw.trim() {
        "NaN" => Some(f64::NAN),
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cast::Numeric => "numeric",
            Cast::String => "string",
            Cast::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

impl FromStr for Cast {
    type Err = PromqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" | "float" | "f64" => Ok(Cast::Numeric),
            "string" | "str" => Ok(Cast::String),
            "boolean" | "bool" => Ok(Cast::Boolean),
            other => Err(PromqlError::InvalidConfig(format!("unsupported cast {:?}", other))),
        }
    }
}

/// Projection and formatting options for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Label names to project, in order. Empty means "labels of the first series".
    pub columns: Vec<String>,
    /// Adds a `datetime` column in this zone when set.
    #[serde(with = "tz_name")]
    pub timezone: Option<Tz>,
    /// Leaves values as strings when unset.
    pub cast: Option<Cast>,
}

impl Schema {
    /// An empty schema: first-series labels, no datetime, string values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Label names to project, in output order.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a `datetime` column in `tz`.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    /// Parses an IANA zone name such as `"Europe/Athens"`.
    pub fn with_timezone_name(self, name: &str) -> Result<Self> {
        let tz = name
            .parse::<Tz>()
            .map_err(|e| PromqlError::InvalidConfig(format!("unknown timezone {:?}: {}", name, e)))?;
        Ok(self.with_timezone(tz))
    }

    /// Casts every sample value.
    pub fn with_cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }
}

mod tz_name {
    use chrono_tz::Tz;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tz: &Option<Tz>, serializer: S) -> Result<S::Ok, S::Error> {
        match tz {
            Some(tz) => serializer.serialize_some(tz.name()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Tz>, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        name.map(|n| n.parse::<Tz>().map_err(de::Error::custom))
            .transpose()
    }
}
