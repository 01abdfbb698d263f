//! Error types for the playout engine.

use thiserror::Error;

/// Main error type for playout operations.
///
/// Capacity problems (queue overflow, pool mismatches) and transient
/// device conditions (late/dropped/flushed frames) are deliberately *not*
/// represented here; they are recovered locally, logged and counted.
/// An `Err` from this crate means the device rejected a configuration or
/// the output could not be brought up at all.
#[derive(Error, Debug)]
pub enum PlayoutError {
    #[error("no display mode matches {0}")]
    UnsupportedMode(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("device rejected request: {0}")]
    Rejected(String),

    #[error("unable to access the output (stream active elsewhere?): {0}")]
    AccessDenied(String),

    #[error("output not initialized")]
    NotInitialized,

    #[error("capability query failed: {0}")]
    Capability(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for playout operations.
pub type Result<T> = std::result::Result<T, PlayoutError>;
