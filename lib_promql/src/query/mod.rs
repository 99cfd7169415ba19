//! # PromQL Query Results
//!
//! Everything that happens after the bytes arrive: classifying the response
//! envelope and flattening instant vectors and range matrices into a table.
//! Nothing in here performs I/O.
//!
//! ## Contained Modules:
//!
//! - **`envelope`**: `success` / `error` / `unknown` classification of a response.
//! - **`series`**: Typed label sets and samples parsed from `result` entries.
//! - **`schema`**: Column projection, timezone and value cast options.
//! - **`normalize`**: The vector/matrix to `Table` conversion.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Response classification.
pub mod envelope;
/// Label sets and samples.
pub mod series;
/// Normalization options.
pub mod schema;
/// Vector and matrix flattening.
pub mod normalize;

pub use envelope::Envelope;
pub use normalize::{normalize, Record, Table};
pub use schema::{Cast, CellValue, Schema};
pub use series::{Sample, Series};
