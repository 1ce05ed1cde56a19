//! Object store seam: fetch one archive object, optionally a byte range of it

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::stream::{ByteCounter, CountingReader, FetchError};

/// Byte subrange of an object, `length` bytes starting at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Last byte covered (inclusive)
    pub const fn last(&self) -> u64 {
        self.offset + self.length.saturating_sub(1)
    }

    /// HTTP `Range` header value (first and last offsets inclusive)
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.offset, self.last())
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

/// Readable body of a fetched object with byte counting for progress
pub struct ObjectStream {
    pub reader: Box<dyn Read + Send>,
    pub counter: ByteCounter,
    /// Advertised size, when the store reports one
    pub total_bytes: Option<u64>,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

impl ObjectStream {
    pub fn new(reader: impl Read + Send + 'static, total_bytes: Option<u64>) -> Self {
        let counter = ByteCounter::default();
        Self {
            reader: Box::new(CountingReader::new(reader, counter.clone())),
            counter,
            total_bytes,
        }
    }
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Remote (or local) store of archive objects.
///
/// Implementations must be shareable across worker threads.
pub trait ObjectFetcher: Send + Sync {
    fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectStream, FetchError>;
}

impl<F: ObjectFetcher + ?Sized> ObjectFetcher for &F {
    fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectStream, FetchError> {
        (**self).get(key, range)
    }
}

impl<F: ObjectFetcher + ?Sized> ObjectFetcher for Box<F> {
    fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectStream, FetchError> {
        (**self).get(key, range)
    }
}

/// Store backed by a directory tree, keys are paths relative to `root`
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

impl ObjectFetcher for LocalFetcher {
    fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectStream, FetchError> {
        let path = self.path_of(key);
        let mut file = File::open(&path).map_err(|e| match e.kind() {
            // Same shape as a store miss so callers see one taxonomy
            io::ErrorKind::NotFound => FetchError::Http {
                status: Some(404),
                message: format!("no such object: {}", path.display()),
            },
            _ => FetchError::Io(e),
        })?;
        let size = file.metadata()?.len();

        match range {
            None => Ok(ObjectStream::new(file, Some(size))),
            Some(range) => {
                if range.offset >= size {
                    return Err(FetchError::Http {
                        status: Some(416),
                        message: format!("range {range} outside object of {size} bytes"),
                    });
                }
                file.seek(SeekFrom::Start(range.offset))?;
                let length = range.length.min(size - range.offset);
                Ok(ObjectStream::new(file.take(length), Some(length)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn store_with(name: &str, content: &[u8]) -> (TempDir, LocalFetcher) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        let fetcher = LocalFetcher::new(dir.path());
        (dir, fetcher)
    }

    #[test]
    fn range_header_is_inclusive() {
        assert_eq!(ByteRange::new(0, 10).header_value(), "bytes=0-9");
        assert_eq!(ByteRange::new(100, 1).header_value(), "bytes=100-100");
    }

    #[test]
    fn local_whole_object() {
        let (_dir, fetcher) = store_with("crawl/a.warc.gz", b"0123456789");
        let mut stream = fetcher.get("crawl/a.warc.gz", None).unwrap();
        assert_eq!(stream.total_bytes, Some(10));
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");
        assert_eq!(stream.counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn local_byte_range() {
        let (_dir, fetcher) = store_with("a", b"0123456789");
        let mut stream = fetcher.get("a", Some(ByteRange::new(3, 4))).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"3456");
    }

    #[test]
    fn local_range_clamped_at_end() {
        let (_dir, fetcher) = store_with("a", b"0123456789");
        let mut stream = fetcher.get("a", Some(ByteRange::new(8, 100))).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"89");
    }

    #[test]
    fn local_range_past_end_is_416() {
        let (_dir, fetcher) = store_with("a", b"0123");
        let err = fetcher.get("a", Some(ByteRange::new(4, 1))).unwrap_err();
        assert!(matches!(err, FetchError::Http { status: Some(416), .. }));
    }

    #[test]
    fn local_missing_is_404() {
        let dir = TempDir::new().unwrap();
        let fetcher = LocalFetcher::new(dir.path());
        let err = fetcher.get("nope.warc.gz", None).unwrap_err();
        assert!(err.is_not_found());
    }
}
