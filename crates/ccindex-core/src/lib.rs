//! ccindex Core - Common infrastructure for archive indexing pipelines
//!
//! This crate provides the reusable pieces for fetching archive objects from
//! a remote store, pacing retries under rate limiting, and writing compressed
//! index files.

pub mod error;
pub mod fetch;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod stream;
pub mod work_queue;

// Re-exports for convenience
pub use error::ObjectError;
pub use fetch::{ByteRange, LocalFetcher, ObjectFetcher, ObjectStream};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{Backoff, ObjectOutcome, RetryPolicy, WaitBudget, retry_with_budget};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{CdxjSink, cleanup_tmp_files};
pub use stream::{ByteCounter, FetchError, HttpConfig, HttpFetcher, SHARED_RUNTIME};
pub use work_queue::WorkQueue;
