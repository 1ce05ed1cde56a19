//! HTTP object streaming with ranged GET and read timeout.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface so archive parsing stays plain `Read`.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, ReadBuf};

use crate::fetch::{ByteRange, ObjectFetcher, ObjectStream};

/// Public HTTP endpoint of the Common Crawl bucket
pub const DEFAULT_BASE_URL: &str = "https://data.commoncrawl.org/";

/// Error types for fetch operations.
///
/// Every variant is transient from the pipeline's point of view: throttling,
/// service errors, timeouts and truncated bodies all go through the retry loop.
#[derive(Debug)]
pub enum FetchError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error while reading the body
    Io(std::io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Short label for diagnostics ("HTTP 503", "timeout", "incomplete read", ...)
    pub fn class(&self) -> String {
        match self {
            Self::Http {
                status: Some(s), ..
            } => format!("HTTP {s}"),
            Self::Http { status: None, .. } => "HTTP".to_string(),
            Self::Io(e) => match e.kind() {
                io::ErrorKind::TimedOut => "timeout".to_string(),
                io::ErrorKind::UnexpectedEof => "incomplete read".to_string(),
                io::ErrorKind::InvalidData => "corrupt stream".to_string(),
                _ => "stream".to_string(),
            },
        }
    }

    /// Object does not exist in the store
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: Some(404), .. })
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Timeouts for the HTTP fetcher
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// No data within this window counts as a stall
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Object fetcher over plain HTTP(S), one GET per object.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    read_timeout: Duration,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(base_url: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            read_timeout: config.read_timeout,
        })
    }

    /// Full URL of an object key
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

impl ObjectFetcher for HttpFetcher {
    fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectStream, FetchError> {
        let url = self.object_url(key);

        let (reader, total_bytes) = SHARED_RUNTIME.handle().block_on(async {
            let mut request = self.client.get(&url);
            if let Some(range) = range {
                request = request.header(reqwest::header::RANGE, range.header_value());
            }
            let response = request
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| FetchError::from_reqwest(&e))?;

            let total_bytes = response.content_length();

            // Convert response body stream to AsyncRead
            let stream = response.bytes_stream();
            let async_reader = tokio_util::io::StreamReader::new(
                stream.map(|result| result.map_err(io::Error::other)),
            );

            Ok::<_, FetchError>((
                TimeoutReader::new(Box::pin(async_reader), self.read_timeout),
                total_bytes,
            ))
        })?;

        Ok(ObjectStream::new(reader, total_bytes))
    }
}

/// Reader wrapper that tracks bytes read
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, count: ByteCounter) -> Self {
        Self { inner, count }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Async-to-sync bridge with read timeout.
///
/// Each read operation has a timeout - if no data arrives within the
/// configured window, returns TimedOut error (which triggers retry).
pub struct TimeoutReader {
    inner: Pin<Box<dyn AsyncRead + Send + Sync>>,
    timeout: Duration,
}

impl TimeoutReader {
    fn new(inner: Pin<Box<dyn AsyncRead + Send + Sync>>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", timeout.as_secs()),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> FetchError {
        FetchError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn class_http_status() {
        assert_eq!(http_err(503).class(), "HTTP 503");
        assert_eq!(http_err(429).class(), "HTTP 429");
    }

    #[test]
    fn class_io_kinds() {
        let timeout = FetchError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(timeout.class(), "timeout");
        let eof = FetchError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "cut"));
        assert_eq!(eof.class(), "incomplete read");
        let reset = FetchError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(reset.class(), "stream");
    }

    #[test]
    fn not_found_only_for_404() {
        assert!(http_err(404).is_not_found());
        assert!(!http_err(403).is_not_found());
        assert!(!FetchError::Io(io::Error::other("x")).is_not_found());
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = FetchError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
    }

    #[test]
    fn object_url_joins_once() {
        let fetcher = HttpFetcher::new("https://example.org/", &HttpConfig::default()).unwrap();
        assert_eq!(
            fetcher.object_url("/crawl-data/a.warc.gz"),
            "https://example.org/crawl-data/a.warc.gz"
        );
        assert_eq!(
            fetcher.object_url("crawl-data/a.warc.gz"),
            "https://example.org/crawl-data/a.warc.gz"
        );
    }

    #[test]
    fn counting_reader_counts() {
        let counter = ByteCounter::default();
        let mut reader = CountingReader::new(&b"hello world"[..], counter.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 11);
    }
}
