//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the stream.
    #[error("read beyond end of stream: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current stream size.
        size: u64,
    },

    /// A mutating call was made on a stream opened for reading only.
    #[error("stream is read-only")]
    ReadOnly,

    /// Truncation was asked to grow the stream.
    #[error("cannot truncate to {requested} bytes, stream holds {size}")]
    InvalidTruncate {
        /// The requested size.
        requested: u64,
        /// The current stream size.
        size: u64,
    },
}
