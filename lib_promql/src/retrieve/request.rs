//! # Request
//!
//! A fully formed GET request for the fetcher: absolute URL, headers and the
//! optional retry settings. Built with consuming `with_*` calls and never
//! mutated afterwards.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use url::Url;

use crate::configs::http_config::{validate_backoff, HttpConfig, DEFAULT_BACKOFF, DEFAULT_RETRIES};
use crate::error::{PromqlError, Result};

/// An immutable GET request with its retry settings.
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    retries: Option<u32>,
    backoff: Option<f64>,
}

impl Request {
    /// Creates a request for an absolute `http`/`https` URL.
    ///
    /// # Errors
    /// `InvalidUrl` for relative URLs and for any other scheme.
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| PromqlError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PromqlError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        Ok(Self {
            url: parsed,
            headers: HeaderMap::new(),
            timeout: None,
            retries: None,
            backoff: None,
        })
    }

    /// Sets a header. Setting the same name again replaces the earlier value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let h_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| PromqlError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let h_value = HeaderValue::from_str(value).map_err(|e| PromqlError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(h_name, h_value);
        Ok(self)
    }

    /// Applies `with_header` for every pair, in order.
    pub fn with_headers<I, K, V>(self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .try_fold(self, |req, (k, v)| req.with_header(k.as_ref(), v.as_ref()))
    }

    /// Initial per-attempt timeout. Without one, each attempt blocks until the server answers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of attempts. An explicit count always governs, even 1.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Factor the per-attempt timeout is multiplied by after each timeout.
    ///
    /// # Errors
    /// `InvalidConfig` unless `backoff` is finite and positive.
    pub fn with_backoff(mut self, backoff: f64) -> Result<Self> {
        validate_backoff(backoff)?;
        self.backoff = Some(backoff);
        Ok(self)
    }

    /// Overrides the retry settings with whatever `config` sets.
    pub fn with_config(mut self, config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        if let Some(timeout) = config.timeout_duration() {
            self.timeout = Some(timeout);
        }
        if let Some(retries) = config.retries {
            self.retries = Some(retries);
        }
        if let Some(backoff) = config.backoff {
            self.backoff = Some(backoff);
        }
        Ok(self)
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers sent with every attempt.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Timeout of the first attempt.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Attempts the fetcher will make: the explicit count, or `DEFAULT_RETRIES`.
    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    /// The explicit backoff, or `DEFAULT_BACKOFF`.
    pub fn backoff(&self) -> f64 {
        self.backoff.unwrap_or(DEFAULT_BACKOFF)
    }

    /// Headers rendered as `{name: value, ...}` for logs and error messages.
    pub fn headers_display(&self) -> String {
        let pairs: Vec<String> = self
            .headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("<binary>")))
            .collect();
        format!("{{{}}}", pairs.join(", "))
    }
}
