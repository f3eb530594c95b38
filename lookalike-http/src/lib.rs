//! Minimal HTTP client for fetching binary resources with bounded retries.
//!
//! - Absolute-URL `GET` returning the raw body
//! - Per-request options: timeout, attempt budget, extra headers
//! - Retries connection errors, timeouts, 429 and 5xx with exponential
//!   backoff and `Retry-After` support; other statuses fail immediately
//! - Optional *raw* request/response logging via `LOOKALIKE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), lookalike_http::HttpError> {
//! let client = lookalike_http::HttpClient::new()?.with_max_attempts(3);
//! let body = client
//!     .get_bytes("https://example.com/cat.jpg", lookalike_http::RequestOpts::default())
//!     .await?;
//! println!("{} bytes", body.len());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, retries and final errors, plus raw request/response
//! lines (target `http.raw`) when `LOOKALIKE_HTTP_RAW=1`. Sensitive query
//! parameters are redacted before they reach a log line.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "LOOKALIKE_HTTP_RAW";
const RAW_MAX_BODY: usize = 4 * 1024;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    let (host_path, query) = redact_query(url);
    let query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    if query.is_empty() {
        parts.push(format!("'{}://{}'", url.scheme(), host_path));
    } else {
        parts.push(format!("'{}://{}?{}'", url.scheme(), host_path, query));
    }
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: u32 },
    #[error("server returned {status} after {attempts} attempt(s): {message}")]
    Api {
        status: StatusCode,
        message: String,
        attempts: u32,
    },
}

impl HttpError {
    /// Whether the failure class is one we retry (network, 429, 5xx).
    ///
    /// ```
    /// use lookalike_http::HttpError;
    /// use reqwest::StatusCode;
    ///
    /// let busy = HttpError::Api {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     message: String::new(),
    ///     attempts: 3,
    /// };
    /// assert!(busy.is_transient());
    ///
    /// let gone = HttpError::Api {
    ///     status: StatusCode::NOT_FOUND,
    ///     message: String::new(),
    ///     attempts: 1,
    /// };
    /// assert!(!gone.is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network { .. } => true,
            HttpError::Api { status, .. } => is_retryable_status(*status),
            HttpError::Url(_) | HttpError::Build(_) => false,
        }
    }

    /// Number of requests sent before giving up (0 if none were sent).
    pub fn attempts(&self) -> u32 {
        match self {
            HttpError::Network { attempts, .. } | HttpError::Api { attempts, .. } => *attempts,
            HttpError::Url(_) | HttpError::Build(_) => 0,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// ==============================
// Request Options
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use lookalike_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     max_attempts: Some(1),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    /// Total attempts including the first; falls back to the client budget.
    pub max_attempts: Option<u32>,
    pub headers: Option<HeaderMap>,
}

// ==============================
// Client
// ==============================

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    user_agent: Option<HeaderValue>,
    pub default_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl HttpClient {
    /// Construct a client with a 5s connect timeout.
    ///
    /// ```no_run
    /// use lookalike_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_attempts, 3);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            user_agent: None,
            default_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        })
    }

    /// Override the per-attempt timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the total attempt budget (clamped to at least one).
    ///
    /// ```no_run
    /// use lookalike_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new()?.with_max_attempts(0);
    /// assert_eq!(client.max_attempts, 1);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Override the first backoff delay; each retry doubles it.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Send this `User-Agent` on every request. Invalid header values are rejected.
    pub fn with_user_agent(mut self, ua: &str) -> Result<Self, HttpError> {
        let value = HeaderValue::from_str(ua)
            .map_err(|e| HttpError::Build(format!("invalid user agent: {e}")))?;
        self.user_agent = Some(value);
        Ok(self)
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// GET an absolute URL and return the body on a 2xx response.
    pub async fn get_bytes(&self, url: &str, opts: RequestOpts) -> Result<Bytes, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::Url(format!("unsupported scheme: {}", url.scheme())));
        }

        let method = Method::GET;
        let max_attempts = opts.max_attempts.unwrap_or(self.max_attempts).max(1);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let req_id = uuid::Uuid::new_v4().simple().to_string();
        let (host_path, redacted_q) = redact_query(&url);

        let mut headers = opts.headers.clone().unwrap_or_default();
        if let Some(ua) = &self.user_agent {
            headers.entry(USER_AGENT).or_insert_with(|| ua.clone());
        }

        let mut attempt = 1u32;
        loop {
            let rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(headers.clone());

            tracing::debug!(
                req_id=%req_id,
                attempt,
                max_attempts,
                method=%method,
                host_path=%host_path,
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&method, &url, &headers);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_attempts,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_attempts,
                        message=%message,
                        "http.network_error.send"
                    );
                    return Err(HttpError::Network {
                        message,
                        attempts: attempt,
                    });
                }
            };
            let status = resp.status();
            let resp_headers = resp.headers().clone();
            let body = match resp.bytes().await {
                Ok(body) => body,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_attempts {
                        let delay = self.backoff_for(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_attempts,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_attempts,
                        message=%message,
                        "http.network_error.body"
                    );
                    return Err(HttpError::Network {
                        message,
                        attempts: attempt,
                    });
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let content_type = resp_headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=body.len(),
                content_length=content_len(&resp_headers, body.len()),
                content_type=%content_type,
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&resp_headers);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%snip_body(&body, RAW_MAX_BODY),
                );
            }

            // ----- Success path -----
            if status.is_success() {
                return Ok(body);
            }

            // ----- Non-success: maybe retry -----
            let message = snip_body(&body, 200);

            if is_retryable_status(status) && attempt < max_attempts {
                let retry_after = retry_after_delay_secs(&resp_headers);
                let delay = retry_after
                    .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
                    .unwrap_or_else(|| self.backoff_for(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_attempts,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after,
                    "http.retrying"
                );
                sleep(delay).await;
                attempt += 1;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                attempt,
                host_path=%host_path,
                message=%message,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                attempts: attempt,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn snip_body(body: &[u8], max: usize) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(max)]).to_string();
    if body.len() > max {
        snip.push_str("...");
    }
    snip
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    // Return "host + path" string and redacted query list for logging
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = v.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "sig"
                    | "signature"
            );
            (k, if is_secret { "<redacted>".into() } else { v })
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}

fn content_len(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(body_len)
}
