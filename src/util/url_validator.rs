use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Whether a feed identity is a URL rather than a shell command line.
///
/// An identity counts as a URL when it parses as an absolute URL with both a
/// scheme and a non-empty host. Everything else is run through the shell.
///
/// ```
/// use rssview::util::is_url;
///
/// assert!(is_url("https://example.com/feed.xml"));
/// assert!(!is_url("cat ~/feeds/local.xml"));
/// assert!(!is_url("file:///tmp/feed.xml"));
/// ```
pub fn is_url(identity: &str) -> bool {
    match Url::parse(identity) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Validates a link before it is handed to the system browser.
///
/// Only http(s) links with a host are opened; item links come from remote
/// documents and a `file:` or custom-scheme link could launch arbitrary
/// handlers.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !url.host_str().is_some_and(|h| !h.is_empty()) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
