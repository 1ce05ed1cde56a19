//! Error type for processing a single archive object

use crate::stream::FetchError;

/// Error from processing a single archive object (fetch + index + write).
///
/// Wraps a remote fetch/stream error ([`FetchError`]), an archive that
/// decodes but is malformed, or a local output I/O error. Only the first is
/// worth retrying: the store may be throttling us, while corrupt bytes and a
/// failing output disk will keep failing.
#[derive(Debug)]
pub enum ObjectError {
    Fetch(FetchError),
    Archive(std::io::Error),
    Output(std::io::Error),
}

impl std::fmt::Display for ObjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "{e}"),
            Self::Archive(e) => write!(f, "malformed archive: {e}"),
            Self::Output(e) => write!(f, "output: {e}"),
        }
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch(e) => Some(e),
            Self::Archive(e) => Some(e),
            Self::Output(e) => Some(e),
        }
    }
}

impl ObjectError {
    /// Transient errors are retried under the wait budget
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Short label for diagnostics
    pub fn class(&self) -> String {
        match self {
            Self::Fetch(e) => e.class(),
            Self::Archive(_) => "archive".to_string(),
            Self::Output(_) => "output".to_string(),
        }
    }
}

impl From<FetchError> for ObjectError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}
