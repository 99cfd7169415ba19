//! # Retrying Fetcher
//!
//! Executes one logical GET with a bounded number of attempts. Only
//! timeouts are retried: after each one the per-attempt timeout is multiplied
//! by the request's backoff, so attempt *k* waits
//! `initial_timeout * backoff^(k-1)`. Any completed HTTP exchange ends the
//! loop whatever its status code; any other transport failure is returned
//! immediately.
//!
//! The per-attempt timeout is a whole-request deadline in `reqwest`, which
//! reports connect and read timeouts alike through `is_timeout()`. Both are
//! therefore treated as retryable, including a server that accepts the
//! connection and then stalls before answering. A client that must only
//! retry connect timeouts can supply its own `Transport` and return
//! `TransportError::Fatal` for the rest.
//!
//! Network access goes through the `Transport` trait. `ReqwestTransport` wraps
//! a shared `reqwest::Client`, whose connection pool is safe to use from many
//! concurrent fetches.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::{PromqlError, Result};
use crate::query::envelope::Envelope;
use crate::retrieve::request::Request;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Bytes,
}

/// Transport-level failure, split by whether the fetcher may retry it.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The attempt hit its timeout. The fetcher retries these.
    Timeout(String),
    /// Any other failure. Returned to the caller as `TransportFailure`.
    Fatal(String),
}

/// Performs a single GET attempt.
pub trait Transport: Send + Sync {
    /// Sends one GET to `url` with `headers`, bounded by `timeout` when set.
    ///
    /// # Errors
    /// `TransportError::Timeout` when the deadline passes, `TransportError::Fatal`
    /// for every other failure to complete the exchange.
    fn get(
        &self,
        url: &Url,
        headers: &HeaderMap,
        timeout: Option<Duration>,
    ) -> impl Future<Output = std::result::Result<HttpResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing client; clones share its connection pool.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout(err.to_string());
        }
        let kind = if err.is_connect() {
            "connection failed"
        } else if err.is_body() {
            "response body error"
        } else if err.is_decode() {
            "response decode error"
        } else if err.is_redirect() {
            "too many redirects"
        } else if err.is_request() {
            "request failed"
        } else {
            "network error"
        };
        TransportError::Fatal(format!("{}: {}", kind, err))
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &HeaderMap,
        timeout: Option<Duration>,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut req = self.client.get(url.clone()).headers(headers.clone());
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let response = req.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Self::classify)?;
        Ok(HttpResponse { status, body })
    }
}

/// Runs requests through the retry loop and parses the result into an `Envelope`.
#[derive(Debug, Clone)]
pub struct Fetcher<T = ReqwestTransport> {
    transport: T,
}

impl Fetcher<ReqwestTransport> {
    /// Creates a fetcher with its own connection pool.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PromqlError::InvalidConfig(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Shares an existing `reqwest::Client` (and its pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self::with_transport(ReqwestTransport::new(client))
    }
}

impl<T: Transport> Fetcher<T> {
    /// Builds a fetcher over any `Transport`.
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs the GET and classifies the response.
    ///
    /// # Arguments
    /// * `request` - URL, headers and retry settings for this call.
    ///
    /// # Errors
    /// - `ConnectionExhausted` when every attempt timed out.
    /// - `TransportFailure` on the first non-timeout transport error.
    pub async fn fetch(&self, request: &Request) -> Result<Envelope> {
        let response = self.get_with_retries(request).await?;
        let envelope = Envelope::parse(response.status, &response.body);
        debug!(url = %request.url(), status = envelope.status(), http_status = response.status, "PromQL response");
        Ok(envelope)
    }

    async fn get_with_retries(&self, request: &Request) -> Result<HttpResponse> {
        let total = request.retries();
        let backoff = request.backoff();
        let headers = request.headers_display();
        let mut remaining = total;
        let mut timeout = request.timeout();

        while remaining > 0 {
            debug!(url = %request.url(), headers = %headers, timeout = ?timeout, "HTTP GET");
            match self.transport.get(request.url(), request.headers(), timeout).await {
                Ok(response) => return Ok(response),
                Err(TransportError::Timeout(reason)) => {
                    remaining -= 1;
                    warn!(url = %request.url(), reason = %reason, "HTTP connection timeout, {} retries remaining", remaining);
                    timeout = timeout.map(|t| scale(t, backoff));
                }
                Err(TransportError::Fatal(message)) => {
                    error!(url = %request.url(), message = %message, "HTTP GET failed");
                    return Err(PromqlError::TransportFailure {
                        url: request.url().to_string(),
                        message,
                    });
                }
            }
        }

        error!(url = %request.url(), headers = %headers, attempts = total, "HTTP GET retries exhausted");
        Err(PromqlError::ConnectionExhausted {
            url: request.url().to_string(),
            headers,
            attempts: total,
        })
    }
}

fn scale(timeout: Duration, factor: f64) -> Duration {
    let nanos = (timeout.as_nanos() as f64 * factor).round();
    if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    /// Replays a fixed list of outcomes and records the timeout of each attempt.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
        timeouts: Mutex<Vec<Option<Duration>>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<std::result::Result<HttpResponse, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                timeouts: Mutex::new(Vec::new()),
            }
        }

        fn timeouts(&self) -> Vec<Option<Duration>> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            _url: &Url,
            _headers: &HeaderMap,
            timeout: Option<Duration>,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.timeouts.lock().unwrap().push(timeout);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Timeout("script exhausted".into())))
        }
    }

    fn ok(status: u16, body: serde_json::Value) -> std::result::Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        })
    }

    fn timeout() -> std::result::Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout("timed out".into()))
    }

    fn request() -> Request {
        Request::new("http://prometheus:9090/api/v1/query?query=up")
            .unwrap()
            .with_header("X-Scope-OrgID", "tenant-1")
            .unwrap()
    }

    #[tokio::test]
    async fn test_n_timeouts_exhaust_after_n_attempts() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![timeout(), timeout(), timeout(), ok(200, json!({}))]));
        let req = request().with_timeout(Duration::from_secs(1)).with_retries(3);

        let err = fetcher.fetch(&req).await.unwrap_err();
        match err {
            PromqlError::ConnectionExhausted { url, headers, attempts } => {
                assert_eq!(attempts, 3);
                assert!(url.contains("/api/v1/query"));
                assert!(headers.contains("tenant-1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fetcher.transport().timeouts().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_escalates_by_backoff() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![
            timeout(),
            timeout(),
            timeout(),
            ok(200, json!({"status": "success", "data": {"resultType": "vector", "result": []}})),
        ]));
        let req = request()
            .with_timeout(Duration::from_millis(100))
            .with_retries(4)
            .with_backoff(3.0)
            .unwrap();

        let env = fetcher.fetch(&req).await.unwrap();
        assert!(env.is_success());
        assert_eq!(
            fetcher.transport().timeouts(),
            vec![
                Some(Duration::from_millis(100)),
                Some(Duration::from_millis(300)),
                Some(Duration::from_millis(900)),
                Some(Duration::from_millis(2700)),
            ]
        );
    }

    #[tokio::test]
    async fn test_default_retry_count_and_backoff() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![]));
        let req = request().with_timeout(Duration::from_secs(1));

        let err = fetcher.fetch(&req).await.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(
            fetcher.transport().timeouts(),
            vec![
                Some(Duration::from_secs(1)),
                Some(Duration::from_secs(2)),
                Some(Duration::from_secs(4)),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_single_attempt() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![timeout(), ok(200, json!({}))]));
        let req = request().with_retries(1);

        let err = fetcher.fetch(&req).await.unwrap_err();
        assert!(matches!(err, PromqlError::ConnectionExhausted { attempts: 1, .. }));
        assert_eq!(fetcher.transport().timeouts(), vec![None]);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_no_attempt() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![ok(200, json!({}))]));
        let err = fetcher.fetch(&request().with_retries(0)).await.unwrap_err();
        assert!(matches!(err, PromqlError::ConnectionExhausted { attempts: 0, .. }));
        assert!(fetcher.transport().timeouts().is_empty());
    }

    #[tokio::test]
    async fn test_non_200_is_not_retried() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![
            ok(503, json!({"status": "error"})),
            ok(200, json!({"status": "success", "data": {}})),
        ]));

        let env = fetcher.fetch(&request()).await.unwrap();
        assert_eq!(env, Envelope::Unknown { http_status: 503 });
        assert_eq!(fetcher.transport().timeouts().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_transport_error_is_not_retried() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![
            Err(TransportError::Fatal("connection refused".into())),
            ok(200, json!({})),
        ]));

        let err = fetcher.fetch(&request()).await.unwrap_err();
        match err {
            PromqlError::TransportFailure { message, .. } => assert_eq!(message, "connection refused"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fetcher.transport().timeouts().len(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_one_timeout() {
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![
            timeout(),
            ok(200, json!({"status": "error", "errorType": "bad_data", "error": "parse error"})),
        ]));

        let env = fetcher.fetch(&request().with_timeout(Duration::from_millis(10))).await.unwrap();
        assert_eq!(env.error_type(), Some("bad_data"));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_fetcher() {
        let body = json!({"status": "success", "data": {"resultType": "vector", "result": []}});
        let fetcher = Fetcher::with_transport(ScriptedTransport::new(vec![ok(200, body.clone()), ok(200, body)]));
        let req = request();

        let (a, b) = tokio::join!(fetcher.fetch(&req), fetcher.fetch(&req));
        assert!(a.unwrap().is_success());
        assert!(b.unwrap().is_success());
        assert_eq!(fetcher.transport().timeouts().len(), 2);
    }

    #[test]
    fn test_scale_saturates() {
        assert_eq!(scale(Duration::from_secs(2), 1.5), Duration::from_secs(3));
        assert_eq!(scale(Duration::MAX, 10.0), Duration::MAX);
    }

    // --- Local socket tests against the real reqwest transport ---

    fn local_fetcher() -> Fetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Fetcher::with_client(client)
    }

    fn respond(mut stream: TcpStream, status_line: &str, body: &str) {
        let mut buf = [0u8; 2048];
        let _ = stream.read(&mut buf);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
    }

    #[tokio::test]
    async fn test_reqwest_transport_success() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let body = json!({
            "status": "success",
            "data": {"resultType": "vector", "result": [{"metric": {"job": "a"}, "value": [1000, "5"]}]}
        })
        .to_string();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                respond(stream, "200 OK", &body);
            }
        });

        let req = Request::new(&format!("http://127.0.0.1:{}/api/v1/query?query=up", port))
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        let env = local_fetcher().fetch(&req).await.unwrap();
        handle.join().unwrap();

        assert_eq!(env.result_type(), Some("vector"));
    }

    #[tokio::test]
    async fn test_reqwest_transport_http_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                respond(stream, "500 Internal Server Error", "{\"status\":\"error\"}");
            }
        });

        let req = Request::new(&format!("http://127.0.0.1:{}/api/v1/query", port)).unwrap();
        let env = local_fetcher().fetch(&req).await.unwrap();
        handle.join().unwrap();

        assert_eq!(env, Envelope::Unknown { http_status: 500 });
    }

    #[tokio::test]
    async fn test_reqwest_transport_timeouts_exhaust() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accepts connections for a while and never answers.
        listener.set_nonblocking(true).unwrap();
        let handle = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_millis(1500);
            let mut held = Vec::new();
            while Instant::now() < deadline {
                match listener.accept() {
                    Ok((stream, _)) => held.push(stream),
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
            held.len()
        });

        let req = Request::new(&format!("http://127.0.0.1:{}/api/v1/query", port))
            .unwrap()
            .with_timeout(Duration::from_millis(100))
            .with_retries(2);
        let err = local_fetcher().fetch(&req).await.unwrap_err();

        assert!(matches!(err, PromqlError::ConnectionExhausted { attempts: 2, .. }), "{:?}", err);
        assert_eq!(handle.join().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reqwest_transport_refused_is_fatal() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let req = Request::new(&format!("http://127.0.0.1:{}/api/v1/query", port))
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        let err = local_fetcher().fetch(&req).await.unwrap_err();

        assert!(matches!(err, PromqlError::TransportFailure { .. }), "{:?}", err);
    }
}
