//! Utility functions for common operations.
//!
//! - **URL validation**: HTTPS policy for the configured API endpoint
//! - **Text processing**: Unicode-aware width, truncation and flattening for cards

mod text;
mod url_validator;

pub use text::{display_width, single_line, truncate_to_width};
pub use url_validator::{validate_base_url, UrlValidationError};
