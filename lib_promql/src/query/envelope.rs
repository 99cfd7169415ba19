//! # Response Envelope
//!
//! Classifies a raw HTTP response from the PromQL API into one of three
//! shapes. Parsing never fails: anything that cannot be trusted or understood
//! degrades to `Envelope::Unknown`, so that errors raised by the fetcher are
//! reserved for transport problems.

use serde_json::Value;
use std::fmt;

/// The parsed and classified server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `status == "success"`. `data` is kept whole; for query endpoints it
    /// holds `resultType` and `result`.
    Success {
        /// The response `data` member.
        data: Value,
    },
    /// `status == "error"`.
    Error {
        /// The `errorType` member, empty when absent.
        error_type: String,
        /// The `error` message, empty when absent.
        error: String,
    },
    /// Non-200 HTTP status, malformed JSON, or an unrecognised `status`.
    Unknown {
        /// The HTTP status of the response.
        http_status: u16,
    },
}

impl Envelope {
    /// Builds an envelope from an HTTP status code and response body.
    pub fn parse(http_status: u16, body: &[u8]) -> Self {
        if http_status != 200 {
            return Envelope::Unknown { http_status };
        }

        let json: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "PromQL response body is not JSON");
                return Envelope::Unknown { http_status };
            }
        };

        match json.get("status").and_then(Value::as_str) {
            Some("success") => match json.get("data") {
                Some(data) => Envelope::Success { data: data.clone() },
                None => Envelope::Unknown { http_status },
            },
            Some("error") => Envelope::Error {
                error_type: string_field(&json, "errorType"),
                error: string_field(&json, "error"),
            },
            _ => Envelope::Unknown { http_status },
        }
    }

    /// `"success"`, `"error"` or `"unknown"`.
    pub fn status(&self) -> &'static str {
        match self {
            Envelope::Success { .. } => "success",
            Envelope::Error { .. } => "error",
            Envelope::Unknown { .. } => "unknown",
        }
    }

    /// True for `Envelope::Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    /// The `data` member of a success response.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Envelope::Success { data } => Some(data),
            _ => None,
        }
    }

    /// `data.resultType`, present for query and query_range responses.
    pub fn result_type(&self) -> Option<&str> {
        self.data()?.get("resultType")?.as_str()
    }

    /// `data.result`, as long as it is an array.
    pub fn result(&self) -> Option<&[Value]> {
        self.data()?.get("result")?.as_array().map(Vec::as_slice)
    }

    /// `errorType` of an error response.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Envelope::Error { error_type, .. } => Some(error_type),
            _ => None,
        }
    }

    /// Message of an error response.
    pub fn error(&self) -> Option<&str> {
        match self {
            Envelope::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The HTTP status the envelope was built from.
    pub fn http_status(&self) -> u16 {
        match self {
            Envelope::Unknown { http_status } => *http_status,
            _ => 200,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status_code: {}, status: {}, ", self.http_status(), self.status())?;
        match self {
            Envelope::Success { data } => write!(f, "data: {}", data),
            Envelope::Error { error_type, error } => {
                write!(f, "errorType: {}, error: {}", error_type, error)
            }
            Envelope::Unknown { .. } => write!(f, "data: None"),
        }
    }
}

fn string_field(json: &Value, key: &str) -> String {
    match json.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
