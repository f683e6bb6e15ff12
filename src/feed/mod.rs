//! Remote feed fetching for the Astronomy Picture of the Day API.
//!
//! The module turns one request into a validated, UI-ready list of items:
//!
//! - **Transport**: a single HTTP GET, status returned as data
//! - **Decoding**: object-or-array JSON into [`FeedItem`]s, skipping malformed items
//! - **Client**: validation, retry with exponential backoff, error classification
//!
//! # Architecture
//!
//! - [`transport`] - The [`Transport`] seam and its reqwest implementation
//! - [`decoder`] - Status check and structural parse of the body
//! - [`client`] - [`FeedClient`], the only orchestration point
//!
//! # Example
//!
//! ```ignore
//! use apod_reader::feed::{FeedClient, FetchRequest, FetchResult, HttpTransport, RetryPolicy};
//!
//! let transport = HttpTransport::new(base_url, Duration::from_secs(10))?;
//! let client = FeedClient::new(transport, RetryPolicy::default());
//!
//! match client.fetch_feed(&FetchRequest::new("DEMO_KEY", "2023-09-08")).await {
//!     FetchResult::Success(page) => println!("{} items", page.items.len()),
//!     FetchResult::Failure { kind, message } => eprintln!("{kind:?}: {message}"),
//! }
//! ```

pub mod client;
pub mod decoder;
pub mod transport;
mod types;

pub use client::{FeedClient, RetryPolicy, RETRIES_EXHAUSTED};
pub use decoder::{decode, DecodeError, DecodedFeed};
pub use transport::{HttpTransport, NetworkErrorKind, RawResponse, Transport, TransportError};
pub use types::{ErrorKind, FeedItem, FeedPage, FetchRequest, FetchResult, RequestError};

/// Production endpoint for the APOD API.
pub const DEFAULT_BASE_URL: &str = "https://api.nasa.gov/planetary/apod";
