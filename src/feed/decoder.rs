//! Response body decoding.
//!
//! The APOD endpoint answers with a single JSON object for a one-day range
//! and an array otherwise, so both shapes are accepted. Inside an array a
//! malformed item is dropped and counted rather than failing the page.

use crate::feed::transport::RawResponse;
use crate::feed::types::FeedItem;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Non-2xx status; the body was not inspected
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// A required field is missing or has the wrong type
    #[error("Malformed item: missing or invalid field `{field}`")]
    MalformedItem { field: &'static str },
    /// The payload as a whole is unusable
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Items decoded from one response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedFeed {
    pub items: Vec<FeedItem>,
    pub skipped: usize,
}

pub fn decode(response: &RawResponse) -> Result<DecodedFeed, DecodeError> {
    if !(200..=299).contains(&response.status) {
        return Err(DecodeError::HttpStatus(response.status));
    }

    let value: Value = serde_json::from_slice(&response.body)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(DecodedFeed {
            items: vec![decode_item(&map)?],
            skipped: 0,
        }),
        Value::Array(values) => {
            let mut items = Vec::with_capacity(values.len());
            let mut skipped = 0;

            for (index, value) in values.iter().enumerate() {
                let item = match value {
                    Value::Object(map) => decode_item(map),
                    _ => Err(DecodeError::MalformedItem { field: "item" }),
                };
                match item {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        skipped += 1;
                        tracing::warn!(index = index, error = %e, "Skipping malformed feed item");
                    }
                }
            }

            Ok(DecodedFeed { items, skipped })
        }
        other => Err(DecodeError::Malformed(format!(
            "expected object or array, found {}",
            json_type_name(&other)
        ))),
    }
}

fn decode_item(map: &Map<String, Value>) -> Result<FeedItem, DecodeError> {
    let title = required_string(map, "title")?;
    let explanation = required_string(map, "explanation")?;
    let image_url = required_string(map, "url")?;
    if Url::parse(&image_url).is_err() {
        return Err(DecodeError::MalformedItem { field: "url" });
    }

    let copyright = match map.get("copyright") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(DecodeError::MalformedItem { field: "copyright" }),
    };

    Ok(FeedItem {
        title,
        explanation,
        image_url,
        copyright,
    })
}

fn required_string(map: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(DecodeError::MalformedItem { field }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
