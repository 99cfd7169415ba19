//! # Configuration Modules
//!
//! Retry defaults for the fetcher and their JSON / environment overrides.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Timeout, retry count and backoff settings.
pub mod http_config;

pub use http_config::{HttpConfig, DEFAULT_BACKOFF, DEFAULT_RETRIES};
