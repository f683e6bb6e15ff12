use serde::Serialize;
use thiserror::Error;

/// One day's astronomy picture record.
///
/// Serializes with the upstream field names (`url` for the image) and omits
/// `copyright` when absent, so an absent copyright never turns into `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub explanation: String,
    #[serde(rename = "url")]
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

/// Local validation failures for a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("API key is empty")]
    EmptyApiKey,
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Parameters for a single feed fetch.
///
/// `Debug` masks the API key so requests can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchRequest {
    api_key: String,
    date: String,
}

impl FetchRequest {
    pub fn new(api_key: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            date: date.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Start date in `YYYY-MM-DD` form.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Checks that the key is non-blank and the date is a real, zero-padded
    /// `YYYY-MM-DD` calendar date.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.api_key.trim().is_empty() {
            return Err(RequestError::EmptyApiKey);
        }
        if !is_calendar_date(&self.date) {
            return Err(RequestError::InvalidDate(self.date.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("api_key", &"[REDACTED]")
            .field("date", &self.date)
            .finish()
    }
}

fn is_calendar_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    // chrono accepts unpadded fields, so pin the shape first
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    shape_ok && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Classification of a failed fetch, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request failed local validation; nothing was sent.
    InvalidRequest,
    /// Transport failure, or transient failures that outlasted the retry budget.
    Network,
    /// The API key was rejected (HTTP 401/403).
    Auth,
    /// Any other non-success status that is not worth retrying.
    ClientError(u16),
    /// The payload as a whole could not be decoded.
    DecodeMalformed,
}

/// Items returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedPage {
    /// Items in upstream order.
    pub items: Vec<FeedItem>,
    /// Malformed items dropped while decoding.
    pub skipped: usize,
    /// Transport calls made, including the successful one.
    pub attempts: u32,
}

/// Outcome of exactly one `fetch_feed` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success(FeedPage),
    Failure { kind: ErrorKind, message: String },
}

impl FetchResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        FetchResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        assert_eq!(FetchRequest::new("DEMO_KEY", "2023-09-08").validate(), Ok(()));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        assert_eq!(
            FetchRequest::new("   ", "2023-09-08").validate(),
            Err(RequestError::EmptyApiKey)
        );
    }

    #[test]
    fn test_malformed_dates_rejected() {
        for date in [
            "",
            "2023-9-08",
            "2023-09-8",
            "2023/09/08",
            "2023-02-30",
            "20230908xx",
            "2023-13-01",
        ] {
            assert!(
                matches!(
                    FetchRequest::new("k", date).validate(),
                    Err(RequestError::InvalidDate(_))
                ),
                "date {date:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_leap_day_accepted() {
        assert!(FetchRequest::new("k", "2024-02-29").validate().is_ok());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let request = FetchRequest::new("super-secret-key", "2023-09-08");
        let debug_output = format!("{:?}", request);
        assert!(!debug_output.contains("super-secret-key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("2023-09-08"));
    }

    #[test]
    fn test_absent_copyright_not_serialized() {
        let item = FeedItem {
            title: "M31".into(),
            explanation: "A galaxy".into(),
            image_url: "https://apod.nasa.gov/m31.jpg".into(),
            copyright: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("copyright").is_none());
        assert_eq!(json["url"], "https://apod.nasa.gov/m31.jpg");
    }
}
