use chrono::Local;
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::feed::parser::parse_feed;
use crate::palette::ERROR_COLOR;
use crate::storage::{Feed, ERROR_FEED_TITLE};
use crate::util::is_url;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Coarse failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SourceUnreachable,
    CommandFailed,
    ParseFailed,
}

/// Errors that can occur while fetching one source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// The shell command could not be launched, timed out or exited non-zero
    #[error("Command failed: {0}")]
    CommandFailed(String),
    /// The retrieved bytes are not an RSS, Atom or JSON feed
    #[error("Parse error: {0}")]
    ParseFailed(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_)
            | FetchError::HttpStatus(_)
            | FetchError::Timeout
            | FetchError::ResponseTooLarge => FailureKind::SourceUnreachable,
            FetchError::CommandFailed(_) => FailureKind::CommandFailed,
            FetchError::ParseFailed(_) => FailureKind::ParseFailed,
        }
    }
}

/// A failed fetch together with the placeholder feed that stands in for it.
#[derive(Debug)]
pub struct FetchFailure {
    pub identity: String,
    pub error: FetchError,
    pub placeholder: Feed,
}

impl FetchFailure {
    fn new(identity: &str, error: FetchError) -> Self {
        let placeholder = Feed {
            link: identity.to_string(),
            title: ERROR_FEED_TITLE.to_string(),
            description: error.to_string(),
            color: ERROR_COLOR,
            ..Default::default()
        };
        Self {
            identity: identity.to_string(),
            error,
            placeholder,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    pub fn into_placeholder(self) -> Feed {
        self.placeholder
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.identity, self.error)
    }
}

impl std::error::Error for FetchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Retrieves feeds from URLs or shell commands.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    diagnostic_log: Option<PathBuf>,
}

impl Fetcher {
    /// Build a fetcher with its own HTTP client.
    ///
    /// `diagnostic_log` receives the raw output of command sources that do
    /// not parse.
    pub fn new(timeout: Duration, diagnostic_log: Option<PathBuf>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, timeout, diagnostic_log))
    }

    pub fn with_client(
        client: reqwest::Client,
        timeout: Duration,
        diagnostic_log: Option<PathBuf>,
    ) -> Self {
        Self {
            client,
            timeout,
            diagnostic_log,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one source and normalize it into a [`Feed`] painted `color`.
    ///
    /// Identities that parse as absolute URLs are retrieved over HTTP; the
    /// rest run as shell command lines. Every failure carries a placeholder
    /// feed for the identity.
    pub async fn fetch(&self, identity: &str, color: u8) -> Result<Feed, FetchFailure> {
        let (bytes, from_command) = if is_url(identity) {
            (self.fetch_url(identity).await, false)
        } else {
            (self.run_command(identity).await, true)
        };
        let bytes = bytes.map_err(|e| {
            tracing::warn!(source = %identity, error = %e, "Fetch failed");
            FetchFailure::new(identity, e)
        })?;

        match parse_feed(&bytes, identity, color, Local::now()) {
            Ok(feed) => {
                tracing::debug!(source = %identity, items = feed.items.len(), "Fetched feed");
                Ok(feed)
            }
            Err(e) => {
                tracing::warn!(source = %identity, error = %e, "Source did not parse as a feed");
                if from_command {
                    self.write_diagnostic(identity, &bytes).await;
                }
                Err(FetchFailure::new(identity, FetchError::ParseFailed(e.to_string())))
            }
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_FEED_SIZE))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn run_command(&self, command_line: &str) -> Result<Vec<u8>, FetchError> {
        let mut cmd = shell_command(command_line);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| FetchError::CommandFailed(format!("failed to launch shell: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FetchError::CommandFailed(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| FetchError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match output.status.code() {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            };
            return Err(FetchError::CommandFailed(if stderr.trim().is_empty() {
                detail
            } else {
                format!("{detail}: {}", stderr.trim())
            }));
        }
        if output.stdout.len() > MAX_FEED_SIZE {
            return Err(FetchError::CommandFailed("output too large".to_string()));
        }
        Ok(output.stdout)
    }

    async fn write_diagnostic(&self, identity: &str, bytes: &[u8]) {
        let Some(path) = &self.diagnostic_log else {
            return;
        };
        match tokio::fs::write(path, bytes).await {
            Ok(()) => {
                tracing::info!(source = %identity, log = %path.display(), "Wrote unparsable command output")
            }
            Err(e) => {
                tracing::warn!(log = %path.display(), error = %e, "Failed to write diagnostic log")
            }
        }
    }
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("powershell.exe");
    cmd.args(["-NoProfile", "-Command", command_line]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command_line]);
    cmd
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Feed</title>
    <item><guid>1</guid><title>Test</title><pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate></item>
</channel></rss>"#;

    fn fetcher(diag: Option<PathBuf>) -> Fetcher {
        Fetcher::new(Duration::from_secs(5), diag).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_url_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let feed = fetcher(None).fetch(&url, 12).await.unwrap();
        assert_eq!(feed.link, url);
        assert_eq!(feed.title, "Mock Feed");
        assert_eq!(feed.color, 12);
        assert_eq!(feed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_url_404_is_unreachable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let failure = fetcher(None).fetch(&url, 12).await.unwrap_err();
        assert!(matches!(failure.error, FetchError::HttpStatus(404)));
        assert_eq!(failure.kind(), FailureKind::SourceUnreachable);

        let placeholder = failure.into_placeholder();
        assert_eq!(placeholder.link, url);
        assert_eq!(placeholder.title, ERROR_FEED_TITLE);
        assert_eq!(placeholder.color, ERROR_COLOR);
        assert!(placeholder.items.is_empty());
        assert!(placeholder.description.contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_url_malformed_is_parse_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("fd.log");
        let url = format!("{}/feed", mock_server.uri());
        let failure = fetcher(Some(log.clone())).fetch(&url, 1).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ParseFailed);
        // Only command sources leave a diagnostic log.
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_fetch_url_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let failure = Fetcher::new(Duration::from_millis(200), None)
            .unwrap()
            .fetch(&url, 1)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::SourceUnreachable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_command_success() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("feed.xml");
        std::fs::write(&file, VALID_RSS).unwrap();

        let command = format!("cat '{}'", file.display());
        let feed = fetcher(None).fetch(&command, 5).await.unwrap();
        assert_eq!(feed.link, command);
        assert_eq!(feed.title, "Mock Feed");
        assert_eq!(feed.items.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_command_nonzero_exit() {
        let failure = fetcher(None).fetch("echo oops >&2; exit 3", 5).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::CommandFailed);
        assert!(failure.error.to_string().contains("exit status 3"));
        assert!(failure.error.to_string().contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_command_garbage_writes_diagnostic_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("fd.log");
        let failure = fetcher(Some(log.clone()))
            .fetch("printf 'definitely not a feed'", 5)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ParseFailed);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "definitely not a feed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_command_timeout() {
        let failure = Fetcher::new(Duration::from_millis(200), None)
            .unwrap()
            .fetch("sleep 5", 5)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::CommandFailed);
    }
}
