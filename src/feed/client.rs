use crate::feed::decoder::{decode, DecodeError, DecodedFeed};
use crate::feed::transport::{HttpTransport, Transport, TransportError};
use crate::feed::types::{ErrorKind, FeedPage, FetchRequest, FetchResult};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Failure message once the attempt budget is spent on transient errors.
pub const RETRIES_EXHAUSTED: &str = "retries exhausted";

/// Attempt budget and backoff schedule.
///
/// The delay before retry `n` is `base_delay * 2^(n-1)`, so with the
/// defaults a fetch makes at most 3 attempts separated by 200ms and 400ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total transport calls allowed, including the first. Zero acts as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Internal classification of a single failed attempt.
#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Network(#[from] TransportError),
    #[error("API key rejected (HTTP {0})")]
    Auth(u16),
    #[error("HTTP error: status {0}")]
    ClientError(u16),
    #[error("Server error: status {0}")]
    ServerTransient(u16),
    #[error(transparent)]
    DecodeMalformed(DecodeError),
}

impl From<DecodeError> for FetchError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::HttpStatus(code @ (401 | 403)) => FetchError::Auth(code),
            DecodeError::HttpStatus(code) if code >= 500 => FetchError::ServerTransient(code),
            DecodeError::HttpStatus(code) => FetchError::ClientError(code),
            other => FetchError::DecodeMalformed(other),
        }
    }
}

impl FetchError {
    /// Returns true if the attempt should be retried within the budget.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(e) => e.kind.is_transient(),
            FetchError::ServerTransient(_) => true,
            FetchError::Auth(_) | FetchError::ClientError(_) | FetchError::DecodeMalformed(_) => {
                false
            }
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network(_) | FetchError::ServerTransient(_) => ErrorKind::Network,
            FetchError::Auth(_) => ErrorKind::Auth,
            FetchError::ClientError(code) => ErrorKind::ClientError(*code),
            FetchError::DecodeMalformed(_) => ErrorKind::DecodeMalformed,
        }
    }

    fn into_failure(self) -> FetchResult {
        FetchResult::failure(self.kind(), self.to_string())
    }
}

/// Stateless feed client: validation, one or more transport attempts, and
/// decoding, folded into a single [`FetchResult`].
///
/// Cloning is cheap and clones share the transport. Calls are independent
/// and may run concurrently.
pub struct FeedClient<T = HttpTransport> {
    transport: Arc<T>,
    retry: RetryPolicy,
}

impl<T> Clone for FeedClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            retry: self.retry,
        }
    }
}

impl<T: Transport> FeedClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            retry,
        }
    }

    /// Fetches one page of feed items.
    ///
    /// Never panics and never returns early without a result: every path ends
    /// in [`FetchResult::Success`] or [`FetchResult::Failure`]. Dropping the
    /// returned future cancels any in-flight exchange or backoff sleep.
    ///
    /// # Behavior
    ///
    /// - Invalid requests fail with `InvalidRequest` before any network call
    /// - Timeouts, connection resets and 5xx responses are retried with
    ///   exponential backoff, up to `max_attempts` calls in total
    /// - 401/403 fail immediately with `Auth`; other 4xx with `ClientError`
    /// - Malformed items are skipped and counted in [`FeedPage::skipped`]
    pub async fn fetch_feed(&self, request: &FetchRequest) -> FetchResult {
        if let Err(e) = request.validate() {
            tracing::warn!(error = %e, "Rejecting invalid feed request");
            return FetchResult::failure(ErrorKind::InvalidRequest, e.to_string());
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.attempt(request).await {
                Ok(DecodedFeed { items, skipped }) => {
                    if skipped > 0 {
                        tracing::warn!(
                            date = request.date(),
                            skipped = skipped,
                            "Malformed feed items skipped"
                        );
                    }
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Feed fetch succeeded after retry");
                    }
                    tracing::debug!(items = items.len(), "Feed fetch complete");
                    return FetchResult::Success(FeedPage {
                        items,
                        skipped,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        tracing::error!(
                            error = %e,
                            attempts = attempt,
                            "Feed fetch failed after all retry attempts exhausted"
                        );
                        return FetchResult::failure(ErrorKind::Network, RETRIES_EXHAUSTED);
                    }

                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient feed fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Feed fetch failed with non-retryable error");
                    return e.into_failure();
                }
            }
        }
    }

    async fn attempt(&self, request: &FetchRequest) -> Result<DecodedFeed, FetchError> {
        let response = self.transport.send(request).await?;
        Ok(decode(&response)?)
    }
}

impl<T: Transport + 'static> FeedClient<T> {
    /// Runs [`fetch_feed`](Self::fetch_feed) on a background task.
    ///
    /// `on_complete` runs on the task with the result unless `cancel` fires
    /// first. Cancellation aborts a pending backoff or exchange, and
    /// `on_complete` is then dropped without being called.
    pub fn spawn_fetch<F>(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        let client = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!(date = request.date(), "Feed fetch cancelled");
                }

                result = client.fetch_feed(&request) => on_complete(result),
            }
        })
    }
}
