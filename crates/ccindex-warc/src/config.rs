//! Batch indexing configuration

use std::path::PathBuf;

use ccindex_core::RetryPolicy;

/// Runtime configuration for a batch run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory receiving `<base>.cdxj.gz` files
    pub output_dir: PathBuf,
    /// Wait budget tunables and attempts per object
    pub retry: RetryPolicy,
    /// Objects processed concurrently; 1 keeps the run strictly sequential
    pub workers: usize,
    /// Skip objects whose index file already exists
    pub skip_existing: bool,
    /// Gzip level for index files (0-9)
    pub compression_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            retry: RetryPolicy::default(),
            workers: 1,
            skip_existing: false,
            compression_level: 6,
        }
    }
}
