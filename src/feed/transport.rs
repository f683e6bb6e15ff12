//! Single-shot HTTP exchange with the upstream feed endpoint.
//!
//! The transport never retries and never interprets the status code: any
//! completed exchange is returned as a [`RawResponse`]. Only failures to
//! complete the exchange become a [`TransportError`].

use crate::feed::types::FetchRequest;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on a response body. A week of APOD entries is a few KB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Why an exchange could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Connect + read exceeded the configured bound.
    Timeout,
    /// The connection dropped mid-exchange.
    ConnectionReset,
    /// DNS failure, refused connection, TLS failure, oversized body.
    Other,
}

impl NetworkErrorKind {
    /// Returns true if the failure is expected to clear up on its own.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            NetworkErrorKind::Timeout | NetworkErrorKind::ConnectionReset
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Network error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn timeout(bound: Duration) -> Self {
        Self::new(
            NetworkErrorKind::Timeout,
            format!("Request timed out after {}ms", bound.as_millis()),
        )
    }

    /// Classifies a reqwest error. The URL is stripped from the message
    /// because it carries the API key in its query string.
    ///
    /// Connect failures (DNS, refused, TLS) and requests that could not be
    /// built are `Other`. Anything that fails after the connection was up is
    /// a dropped connection, including hyper's "connection closed before
    /// message completed", which carries no `io::Error`.
    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if is_connection_reset(&err) {
            NetworkErrorKind::ConnectionReset
        } else if err.is_connect() || err.is_builder() || err.is_redirect() {
            NetworkErrorKind::Other
        } else {
            NetworkErrorKind::ConnectionReset
        };
        Self::new(kind, err.without_url().to_string())
    }
}

/// Walks the source chain looking for an I/O error caused by the peer
/// dropping the connection.
fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            );
        }
        source = e.source();
    }
    false
}

/// One request/response exchange with the feed endpoint.
///
/// Implementations must not retry; retry policy belongs to
/// [`FeedClient`](crate::feed::FeedClient).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport with its own connection pool.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("apod-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    pub fn with_client(client: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    fn request_url(&self, request: &FetchRequest) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("api_key", request.api_key())
            .append_pair("start_date", request.date());
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        let url = self.request_url(request);
        tracing::debug!(endpoint = %self.base_url, date = request.date(), "Sending feed request");

        // The bound covers headers and body together
        let exchange = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(TransportError::from_reqwest)?;
            let status = response.status().as_u16();
            let body = read_limited_bytes(response, MAX_BODY_SIZE).await?;
            Ok::<_, TransportError>(RawResponse { status, body })
        };

        let result = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::timeout(self.timeout))?;

        match &result {
            Ok(response) => tracing::debug!(
                status = response.status,
                bytes = response.body.len(),
                "Feed response received"
            ),
            Err(e) => tracing::debug!(error = %e, "Feed exchange failed"),
        }
        result
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::new(
                NetworkErrorKind::Other,
                format!("Response too large ({len} bytes, limit {limit})"),
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::from_reqwest)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::new(
                NetworkErrorKind::Other,
                format!("Response too large (limit {limit} bytes)"),
            ));
        }
        bytes.extend_from_slice(&chunk);
    }

    // A short body means the peer hung up mid-transfer
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::new(
                NetworkErrorKind::ConnectionReset,
                format!(
                    "Incomplete response: expected {expected} bytes, received {}",
                    bytes.len()
                ),
            ));
        }
    }

    Ok(bytes)
}
