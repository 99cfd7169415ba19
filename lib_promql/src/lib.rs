//! # lib_promql
//!
//! Client core for the Prometheus HTTP query API.
//!
//! A caller hands a fully formed URL to the `Fetcher` (feature `retrieve`),
//! gets back an `Envelope`, and flattens it with `normalize` into a `Table`
//! of uniform records:
//!
//! ```ignore
//! use lib_promql::{normalize, Fetcher, Request, Schema};
//! use std::time::Duration;
//!
//! let fetcher = Fetcher::new()?;
//! let request = Request::new("http://localhost:9090/api/v1/query?query=up")?
//!     .with_timeout(Duration::from_secs(2))
//!     .with_retries(3);
//! let envelope = fetcher.fetch(&request).await?;
//! let table = normalize(&envelope, Some(&Schema::new().with_columns(["job", "instance"])))?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Retry configuration.
pub mod configs;
/// Crate-wide error type.
pub mod error;
/// Envelope parsing and result normalization.
pub mod query;
/// HTTP request and retrying fetch.
#[cfg(feature = "retrieve")]
pub mod retrieve;

// --- Public API Re-exports ---
pub use configs::HttpConfig;
pub use error::{PromqlError, Result};
pub use query::{normalize, Cast, CellValue, Envelope, Record, Schema, Table};
#[cfg(feature = "retrieve")]
pub use retrieve::{Fetcher, Request};
