//! # BlobDB Testkit
//!
//! Test utilities for BlobDB blob log files.
//!
//! This crate provides:
//! - Fixtures for writing logs and damaging them in controlled ways
//! - A storage backend that simulates crashes mid-write
//! - Property-based test generators using proptest
//! - Fuzz targets for the decoders and the reader
//! - Byte-exact format vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blobdb_testkit::prelude::*;
//!
//! #[test]
//! fn survives_a_flipped_bit() {
//!     let log = TestLog::build(&LogConfig::default().best_effort(), &records, true);
//!     log.flip_bit(100, 3);
//!     let report = log.recover().unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
    pub use blobdb_log::{BlobRecord, LogConfig, SequenceNumber};
}

pub use crash::*;
pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use vectors::*;
