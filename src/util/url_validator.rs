use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP would send the API key in clear text.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

/// Validates the configured API endpoint.
///
/// HTTPS is required because the API key travels in the query string.
/// Plain HTTP is accepted only for loopback hosts so tests can point the
/// client at a local fake server.
///
/// # Examples
///
/// ```
/// use apod_reader::util::validate_base_url;
///
/// assert!(validate_base_url("https://api.nasa.gov/planetary/apod").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080/apod").is_ok());
/// assert!(validate_base_url("http://api.nasa.gov/planetary/apod").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => {
            tracing::warn!(base_url = %url, "Using non-HTTPS base URL (loopback only)");
            Ok(url)
        }
        "http" => Err(UrlValidationError::InsecureBaseUrl),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_base_url("https://api.nasa.gov/planetary/apod").unwrap();
        assert_eq!(url.host_str(), Some("api.nasa.gov"));
    }

    #[test]
    fn test_loopback_http_accepted() {
        assert!(validate_base_url("http://localhost:3000/apod").is_ok());
        assert!(validate_base_url("http://127.0.0.1:3000/apod").is_ok());
        assert!(validate_base_url("http://[::1]:3000/apod").is_ok());
    }

    #[test]
    fn test_remote_http_rejected() {
        assert_eq!(
            validate_base_url("http://evil.com/apod"),
            Err(UrlValidationError::InsecureBaseUrl)
        );
        assert_eq!(
            validate_base_url("http://192.168.1.10/apod"),
            Err(UrlValidationError::InsecureBaseUrl)
        );
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_base_url("ftp://example.com/apod"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_base_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unparsable_rejected() {
        assert!(matches!(
            validate_base_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
