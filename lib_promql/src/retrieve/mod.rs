//! # Data Retrieval Module
//!
//! The network half of the client: request construction and the retrying
//! GET that turns a URL into a classified `Envelope`.
//!
//! ## Contained Modules:
//!
//! - **`request`**: The immutable `Request` (URL, headers, timeout, retries,
//!   backoff) handed to the fetcher by URL-building callers.
//! - **`fetcher`**: The `Fetcher`, built on `reqwest`, which retries timed-out
//!   attempts with an exponentially growing per-attempt timeout and fails fast
//!   on every other transport error.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Immutable GET request with retry settings.
pub mod request;
/// Timeout-only retry loop over a pluggable transport.
pub mod fetcher;

pub use fetcher::{Fetcher, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use request::Request;
