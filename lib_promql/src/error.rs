//! # Error Types
//!
//! A single error enum covers the whole pipeline: request construction,
//! the retrying fetch and result normalization. Every variant carries the
//! context needed to diagnose it (URL, headers, offending label or value).

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PromqlError>;

/// Failures raised while building, fetching or normalizing a PromQL query.
#[derive(Debug, Error)]
pub enum PromqlError {
    /// The request URL could not be parsed or is not `http`/`https`.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as given by the caller.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A header name or value contains characters HTTP does not allow.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// The header name as given by the caller.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A timeout, backoff, cast or timezone setting is out of range or unknown.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every attempt ended in a timeout. Retryable by policy, but the fetcher
    /// does not retry beyond its own loop.
    #[error("HTTP GET request failed after {attempts} attempts. URL: {url}; headers: {headers}")]
    ConnectionExhausted {
        /// Target URL.
        url: String,
        /// Request headers in `{name: value, ...}` form.
        headers: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Non-timeout transport failure (DNS, refused connection, bad response).
    #[error("HTTP GET request to {url} failed: {message}")]
    TransportFailure {
        /// Target URL.
        url: String,
        /// Classified transport message.
        message: String,
    },

    /// Normalization was asked for an envelope that is not a success.
    #[error("No data in PromQL query response (status: {status})")]
    NoData {
        /// The envelope status (`error` or `unknown`).
        status: String,
    },

    /// The `result` array is empty.
    #[error("PromQL query response has no results")]
    EmptyResult,

    /// `resultType` is neither `vector` nor `matrix`.
    #[error("Unexpected PromQL result type: {0}")]
    UnsupportedResultType(String),

    /// A series lacks one of the projected label columns.
    #[error("Label {label:?} is missing on series {series}")]
    MissingLabel {
        /// The missing label name.
        label: String,
        /// Zero-based index of the series in `result`.
        series: usize,
    },

    /// The `result` payload does not have the vector or matrix structure.
    #[error(
        "Malformed PromQL result{}: {reason}",
        .series.map(|i| format!(" at series {}", i)).unwrap_or_default()
    )]
    MalformedResult {
        /// Zero-based index of the offending series; `None` when the
        /// `result` member itself is malformed.
        series: Option<usize>,
        /// What is wrong with it.
        reason: String,
    },

    /// A sample value does not convert under the requested cast.
    #[error("Cannot cast {value:?} to {cast}")]
    CastError {
        /// The raw wire value.
        value: String,
        /// Name of the cast that failed.
        cast: String,
    },

    /// A sample timestamp is not finite or falls outside the datetime range.
    #[error("Timestamp {0} cannot be represented as a datetime")]
    InvalidTimestamp(f64),
}

impl PromqlError {
    /// True for the only failure class the caller may sensibly retry.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PromqlError::ConnectionExhausted { .. })
    }
}
