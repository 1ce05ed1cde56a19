//! Graceful shutdown support via atomic flag
//!
//! Batch runs check the flag between archive objects, so an interrupt lets
//! the object in flight finish writing its index file.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request shutdown; returns whether it had already been requested
pub fn request_shutdown() -> bool {
    shutdown_flag().swap(true, Ordering::Relaxed)
}
