//! # BlobDB Storage
//!
//! Byte-stream backends for BlobDB blob log files.
//!
//! A blob log never opens files or picks file names on its own. It is
//! handed a [`StorageBackend`] that offers sequential append access for
//! the single writer of a file and positional reads for any number of
//! readers. Backends are **opaque byte stores**: headers, records, block
//! padding and footers are all interpreted by `blobdb_log`.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and scratch files
//! - [`FileBackend`] - For blob files on the local file system
//!
//! ## Example
//!
//! ```rust
//! use blobdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"blob bytes").unwrap();
//! let data = backend.read_at(offset, 10).unwrap();
//! assert_eq!(&data, b"blob bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
