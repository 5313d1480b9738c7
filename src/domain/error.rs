//! Error types for the storage proxy.
//!
//! [`ProxyError`] is the single error type shared by the storage engines, the
//! worker and the client. [`Result`] aliases it for brevity.

use std::time::Duration;
use thiserror::Error;

/// The main error type for storage proxy operations.
///
/// The worker never sends an error back over a reply port; errors raised while
/// handling a message are logged and the message goes unanswered. Only the
/// client surfaces errors to callers, typically as [`ProxyError::Timeout`].
///
/// # Examples
///
/// ```
/// use storeproxy::ProxyError;
///
/// fn open_legacy() -> Result<(), ProxyError> {
///     Err(ProxyError::VersionMismatch { requested: 1, stored: 2 })
/// }
///
/// assert!(open_legacy().is_err());
/// ```
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A storage engine operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A database file or wire message could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database was opened with a version older than the one on disk.
    #[error("Version error: requested version {requested} is less than stored version {stored}")]
    VersionMismatch {
        /// Version passed to `open`.
        requested: u32,
        /// Version recorded in the database.
        stored: u32,
    },

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The worker runtime could not accept or route a message.
    #[error("Worker communication error: {0}")]
    Worker(String),

    /// No reply arrived within the caller's deadline.
    #[error("no reply received within {0:?}")]
    Timeout(Duration),

    /// The reply port was dropped without a message being posted.
    #[error("reply channel closed before a response was posted")]
    ChannelClosed,
}

/// A specialized `Result` type for storage proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
