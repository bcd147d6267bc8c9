//! Error types for the blob log.

use thiserror::Error;

/// Result type for blob log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Broad class of a [`LogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed bytes: magic, version, lengths, ranges, tags.
    Format,
    /// A stored checksum disagrees with the bytes it covers.
    Checksum,
    /// Fragments arrived in an order no writer produces.
    Framing,
    /// The caller broke the writer's usage contract.
    Contract,
    /// The byte stream failed.
    Storage,
    /// The configuration is unusable.
    Config,
}

/// Errors that can occur while encoding, writing or reading a blob log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] blobdb_storage::StorageError),

    /// The magic number is not the one expected at this position.
    #[error("bad magic number: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic {
        /// Expected magic.
        expected: u32,
        /// Magic found in the input.
        actual: u32,
    },

    /// The file was written by a newer format generation.
    #[error("unsupported format version {version} (highest understood: {max})")]
    UnsupportedVersion {
        /// Version found in the header.
        version: u32,
        /// Highest version this build reads.
        max: u32,
    },

    /// Fewer bytes were available than the structure requires.
    #[error("truncated input: need {needed} bytes, have {available}")]
    TruncatedInput {
        /// Bytes required.
        needed: u64,
        /// Bytes available.
        available: u64,
    },

    /// A stored range has its lower bound above its upper bound.
    #[error("invalid {field} range: {low} > {high}")]
    InvalidRange {
        /// Which range was invalid.
        field: &'static str,
        /// Lower bound.
        low: u64,
        /// Upper bound.
        high: u64,
    },

    /// The presence flags word holds values no writer emits.
    #[error("invalid flags word {flags:#010x}")]
    InvalidFlags {
        /// The raw flags word.
        flags: u32,
    },

    /// The compression tag is not a known codec.
    #[error("unknown compression tag {0}")]
    UnknownCompression(u8),

    /// A record header carries an unknown type tag.
    #[error("unknown record type {0}")]
    UnknownRecordType(u8),

    /// A record header carries an unknown subtype tag.
    #[error("unknown record subtype {0}")]
    UnknownSubtype(u8),

    /// The record header checksum does not match.
    #[error("record header checksum mismatch: stored {expected:08x}, computed {actual:08x}")]
    HeaderChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The key/blob checksum does not match.
    #[error("record payload checksum mismatch: stored {expected:08x}, computed {actual:08x}")]
    PayloadChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The sequence-number trailer checksum does not match.
    #[error("record trailer checksum mismatch: stored {expected:08x}, computed {actual:08x}")]
    TrailerChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Fragments were not in full / first, middle*, last order.
    #[error("fragment sequence error: {message}")]
    FragmentSequence {
        /// What was out of order.
        message: String,
    },

    /// Reassembled fragments do not add up to the length the header declares.
    #[error("record length mismatch: header declares {expected} bytes, fragments hold {actual}")]
    RecordLengthMismatch {
        /// Length implied by the record header.
        expected: u64,
        /// Length actually reassembled.
        actual: u64,
    },

    /// A sequence number lower than one already appended.
    #[error("sequence order violation: {attempted} appended after {last}")]
    SequenceOrderViolation {
        /// Highest sequence number appended so far.
        last: u64,
        /// Rejected sequence number.
        attempted: u64,
    },

    /// The writer has already emitted its footer.
    #[error("blob log writer is closed")]
    WriterClosed,

    /// A writer was opened over a stream that already holds bytes.
    #[error("stream is not empty: {size} bytes present")]
    StreamNotEmpty {
        /// Current stream size.
        size: u64,
    },

    /// A key or blob exceeds the configured or encodable limit.
    #[error("{what} too large: {size} bytes exceeds limit of {limit}")]
    RecordTooLarge {
        /// `"key"` or `"blob"`.
        what: &'static str,
        /// Offending size.
        size: u64,
        /// Limit in force.
        limit: u64,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        message: String,
    },

    /// A per-record failure surfaced by a strict reader.
    #[error("corruption at offset {offset}: {source}")]
    Corrupted {
        /// File offset where the damaged record or frame starts.
        offset: u64,
        /// The underlying failure.
        #[source]
        source: Box<LogError>,
    },
}

impl LogError {
    /// Creates a fragment sequence error.
    pub fn fragment_sequence(message: impl Into<String>) -> Self {
        Self::FragmentSequence {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a truncated input error.
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::TruncatedInput {
            needed: needed as u64,
            available: available as u64,
        }
    }

    /// Wraps a per-record error with the offset it was found at.
    pub fn corrupted(offset: u64, source: LogError) -> Self {
        Self::Corrupted {
            offset,
            source: Box::new(source),
        }
    }

    /// Returns the broad class of this error.
    ///
    /// `Corrupted` reports the class of the error it wraps.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            Self::BadMagic { .. }
            | Self::UnsupportedVersion { .. }
            | Self::TruncatedInput { .. }
            | Self::InvalidRange { .. }
            | Self::InvalidFlags { .. }
            | Self::UnknownCompression(_)
            | Self::UnknownRecordType(_)
            | Self::UnknownSubtype(_) => ErrorCategory::Format,
            Self::HeaderChecksumMismatch { .. }
            | Self::PayloadChecksumMismatch { .. }
            | Self::TrailerChecksumMismatch { .. } => ErrorCategory::Checksum,
            Self::FragmentSequence { .. } | Self::RecordLengthMismatch { .. } => {
                ErrorCategory::Framing
            }
            Self::SequenceOrderViolation { .. }
            | Self::WriterClosed
            | Self::StreamNotEmpty { .. }
            | Self::RecordTooLarge { .. } => ErrorCategory::Contract,
            Self::InvalidConfig { .. } => ErrorCategory::Config,
            Self::Corrupted { source, .. } => source.category(),
        }
    }

    /// Returns whether a best-effort reader may report this error and
    /// resynchronize instead of stopping.
    ///
    /// Only damage confined to one record qualifies. Header, footer,
    /// storage and contract failures never do.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::HeaderChecksumMismatch { .. }
            | Self::PayloadChecksumMismatch { .. }
            | Self::TrailerChecksumMismatch { .. }
            | Self::FragmentSequence { .. }
            | Self::RecordLengthMismatch { .. }
            | Self::TruncatedInput { .. }
            | Self::UnknownRecordType(_)
            | Self::UnknownSubtype(_) => true,
            Self::Corrupted { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}
