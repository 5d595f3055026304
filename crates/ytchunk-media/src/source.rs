//! Remote source fetching using yt-dlp.
//!
//! The fetcher performs a metadata lookup and opens the muxed media as a
//! byte stream on yt-dlp's stdout. Authentication material (cookies file,
//! user agent, extra headers) is injected through [`SourceCredentials`].

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// A readable stream of source bytes.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Format selector for the highest quality muxed audio+video rendition.
pub const DEFAULT_FORMAT: &str = "best[acodec!=none][vcodec!=none]/best";

/// Minimum size for a valid cookies file (bytes).
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Metadata describing a remote source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Duration in seconds, when known
    #[serde(default)]
    pub duration: Option<f64>,
}

/// A source that has been looked up and opened.
pub struct FetchedSource {
    pub metadata: SourceMetadata,
    pub stream: ByteStream,
}

/// Opens remote sources.
///
/// Implementations talk to an untrusted, potentially slow dependency;
/// callers are expected to bound the metadata lookup.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Look up metadata for a source.
    async fn fetch_metadata(&self, source_url: &str) -> MediaResult<SourceMetadata>;

    /// Open a byte stream of the muxed media.
    async fn open_stream(&self, source_url: &str) -> MediaResult<ByteStream>;

    /// Look up metadata, then open the stream.
    async fn fetch(&self, source_url: &str) -> MediaResult<FetchedSource> {
        let metadata = self.fetch_metadata(source_url).await?;
        let stream = self.open_stream(source_url).await?;
        Ok(FetchedSource { metadata, stream })
    }
}

/// Authentication context for the source.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    /// Netscape-format cookies file
    pub cookies_file: Option<PathBuf>,
    /// User agent to present
    pub user_agent: Option<String>,
    /// Extra request headers as `(name, value)`
    pub headers: Vec<(String, String)>,
}

impl SourceCredentials {
    /// Create credentials from environment variables.
    ///
    /// - `YTDLP_COOKIES_FILE`: path to a Netscape cookies file
    /// - `SOURCE_USER_AGENT`: user agent string
    /// - `SOURCE_HEADERS`: `Name:Value` pairs separated by `;`
    pub fn from_env() -> Self {
        Self {
            cookies_file: std::env::var("YTDLP_COOKIES_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            user_agent: std::env::var("SOURCE_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            headers: std::env::var("SOURCE_HEADERS")
                .map(|s| parse_headers(&s))
                .unwrap_or_default(),
        }
    }

    /// yt-dlp arguments carrying these credentials.
    ///
    /// A configured cookies file that is missing or not in Netscape format
    /// is skipped with a warning.
    pub async fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(path) = &self.cookies_file {
            if usable_cookies_file(path).await {
                args.push("--cookies".to_string());
                args.push(path.to_string_lossy().to_string());
            }
        }

        if let Some(ua) = &self.user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.clone());
        }

        for (name, value) in &self.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        args
    }
}

fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Validate that a cookies file appears to be in Netscape format.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

async fn usable_cookies_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.len() >= MIN_COOKIES_FILE_SIZE => {}
        Ok(metadata) => {
            warn!(
                "Cookies file {} is too small ({} bytes), skipping",
                path.display(),
                metadata.len()
            );
            return false;
        }
        Err(e) => {
            warn!("Cookies file {} not readable, skipping: {}", path.display(), e);
            return false;
        }
    }

    match tokio::fs::read_to_string(path).await {
        Ok(content) if is_valid_netscape_cookies(&content) => true,
        Ok(_) => {
            warn!(
                "Cookies file {} is not in Netscape format, skipping",
                path.display()
            );
            false
        }
        Err(e) => {
            warn!("Failed to read cookies file {}: {}", path.display(), e);
            false
        }
    }
}

/// Source fetcher backed by the `yt-dlp` CLI.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    credentials: SourceCredentials,
}

impl YtDlpFetcher {
    pub fn new(credentials: SourceCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SourceFetcher for YtDlpFetcher {
    async fn fetch_metadata(&self, source_url: &str) -> MediaResult<SourceMetadata> {
        let ytdlp = check_ytdlp()?;

        let mut args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
        ];
        args.extend(self.credentials.to_args().await);
        args.push(source_url.to_string());

        let output = Command::new(ytdlp)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::fetch_failed(format!(
                "metadata lookup failed: {}",
                last_line(&stderr)
            )));
        }

        let metadata: SourceMetadata = serde_json::from_slice(&output.stdout)?;
        info!(
            source_id = %metadata.id,
            title = %metadata.title,
            duration = ?metadata.duration,
            "Fetched source metadata"
        );
        Ok(metadata)
    }

    async fn open_stream(&self, source_url: &str) -> MediaResult<ByteStream> {
        let ytdlp = check_ytdlp()?;

        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--no-part".to_string(),
            "-f".to_string(),
            DEFAULT_FORMAT.to_string(),
            "-o".to_string(),
            "-".to_string(),
        ];
        args.extend(self.credentials.to_args().await);
        args.push(source_url.to_string());

        let mut child = Command::new(ytdlp)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::fetch_failed(format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("yt-dlp stdout not captured"))?;

        debug!(url = source_url, format = DEFAULT_FORMAT, "Opened source stream");
        Ok(Box::new(ChildStream { _child: child, stdout }))
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error")
}

/// Stdout of a child process; the child is killed when the stream is dropped.
struct ChildStream {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ChildStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("Accept-Language: en-US; X-Forwarded-For:1.2.3.4;broken;");
        assert_eq!(
            headers,
            vec![
                ("Accept-Language".to_string(), "en-US".to_string()),
                ("X-Forwarded-For".to_string(), "1.2.3.4".to_string()),
            ]
        );
    }

    #[test]
    fn test_netscape_cookie_detection() {
        assert!(is_valid_netscape_cookies("# Netscape HTTP Cookie File\n"));
        assert!(is_valid_netscape_cookies(
            ".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=81"
        ));
        assert!(!is_valid_netscape_cookies("SID=abc; APISID=def"));
    }

    #[tokio::test]
    async fn test_credentials_args() {
        let mut cookies = tempfile::NamedTempFile::new().unwrap();
        writeln!(cookies, "# Netscape HTTP Cookie File").unwrap();
        writeln!(cookies, ".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=81").unwrap();

        let credentials = SourceCredentials {
            cookies_file: Some(cookies.path().to_path_buf()),
            user_agent: Some("Mozilla/5.0".to_string()),
            headers: vec![("DNT".to_string(), "1".to_string())],
        };

        let args = credentials.to_args().await;
        assert_eq!(args[0], "--cookies");
        assert_eq!(args[1], cookies.path().to_string_lossy());
        assert!(args.windows(2).any(|w| w[0] == "--user-agent" && w[1] == "Mozilla/5.0"));
        assert!(args.windows(2).any(|w| w[0] == "--add-header" && w[1] == "DNT:1"));
    }

    #[tokio::test]
    async fn test_invalid_cookies_file_is_skipped() {
        let mut cookies = tempfile::NamedTempFile::new().unwrap();
        writeln!(cookies, "{}", "not a cookie jar ".repeat(10)).unwrap();

        let credentials = SourceCredentials {
            cookies_file: Some(cookies.path().to_path_buf()),
            ..Default::default()
        };
        assert!(credentials.to_args().await.is_empty());

        let missing = SourceCredentials {
            cookies_file: Some(PathBuf::from("/nonexistent/cookies.txt")),
            ..Default::default()
        };
        assert!(missing.to_args().await.is_empty());
    }

    #[test]
    fn test_metadata_parses_partial_json() {
        let metadata: SourceMetadata =
            serde_json::from_str(r#"{"id":"abc","title":"A video","duration":212.0,"formats":[]}"#)
                .unwrap();
        assert_eq!(metadata.title, "A video");
        assert_eq!(metadata.duration, Some(212.0));
    }
}
