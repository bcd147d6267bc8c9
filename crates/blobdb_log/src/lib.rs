//! # BlobDB Log
//!
//! The on-disk format for BlobDB blob files: an append-only log that keeps
//! large values out of the key-value index.
//!
//! A blob file is a fixed header, a region of fixed-size blocks holding
//! framed records, and a fixed footer written when the file is sealed:
//!
//! ```text
//! | header (44) | block | block | ... | block (partial) | footer (64) |
//! ```
//!
//! ## Components
//!
//! - [`LogHeader`] / [`LogFooter`] - file metadata codecs
//! - [`BlobRecord`], [`RecordHeader`] - record codec with header and payload checksums
//! - [`BlockFramer`] / [`FragmentAssembler`] - splitting records across blocks and back
//! - [`BlobLogWriter`] - appends records and tracks footer aggregates
//! - [`BlobLogReader`] - sequential scanner with strict or best-effort recovery
//!
//! The byte stream itself is a [`blobdb_storage::StorageBackend`].
//!
//! ## Example
//!
//! ```rust
//! use blobdb_log::{BlobLogReader, BlobLogWriter, LogConfig, LogEntry, SequenceNumber};
//! use blobdb_storage::InMemoryBackend;
//!
//! let config = LogConfig::default();
//! let mut writer = BlobLogWriter::open(Box::new(InMemoryBackend::new()), config.clone()).unwrap();
//! let location = writer
//!     .append(b"user:1", b"a large value", None, None, SequenceNumber::new(7))
//!     .unwrap();
//! writer.close().unwrap();
//!
//! let backend = writer.into_backend();
//! let mut reader = BlobLogReader::open(backend.as_ref(), &config).unwrap();
//! match reader.next().unwrap().unwrap() {
//!     LogEntry::Record(read) => {
//!         assert_eq!(read.record.key, b"user:1");
//!         assert_eq!(read.location, location);
//!     }
//!     LogEntry::Corruption(event) => panic!("{event}"),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod format;
pub mod log;
mod types;

pub use config::{LogConfig, RecoveryMode, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use error::{ErrorCategory, LogError, LogResult};
pub use format::{
    BlobRecord, LogFooter, LogHeader, RecordHeader, RecordSubtype, RecordType, FORMAT_VERSION,
};
pub use log::{
    BlobLogReader, BlobLogWriter, BlockFramer, CorruptionEvent, FooterSummary, FragmentAssembler,
    LogEntry, ReadRecord, ReaderState, RecoveryReport,
};
pub use types::{CompressionType, RecordLocation, SequenceNumber, ValueRange};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
