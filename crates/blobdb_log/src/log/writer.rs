//! Blob log writer.

use crate::config::LogConfig;
use crate::error::{LogError, LogResult};
use crate::format::{encode_record, BlobRecord, LogFooter, LogHeader, NO_TIMESTAMP, NO_TTL};
use crate::log::framer::BlockFramer;
use crate::types::{RecordLocation, SequenceNumber};
use blobdb_storage::StorageBackend;
use std::fmt;

/// What [`BlobLogWriter::close`] sealed the file with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterSummary {
    /// The footer as written.
    pub footer: LogFooter,
    /// File size after the footer.
    pub file_size: u64,
}

/// Appends records to one blob log file.
///
/// The writer owns its stream for the lifetime of the file: a header is
/// written on [`open`](Self::open), framed records on each
/// [`append`](Self::append), and the footer on [`close`](Self::close).
/// Only one writer may exist per file; readers can be opened on the
/// backend once the writer is closed (see [`into_backend`](Self::into_backend)).
///
/// # Example
///
/// ```rust,ignore
/// let mut writer = BlobLogWriter::open(Box::new(InMemoryBackend::new()), LogConfig::default())?;
/// let location = writer.append(b"key", b"blob", None, None, SequenceNumber::new(1))?;
/// let summary = writer.close()?;
/// assert_eq!(summary.footer.record_count(), 1);
/// ```
pub struct BlobLogWriter {
    backend: Box<dyn StorageBackend>,
    config: LogConfig,
    header: LogHeader,
    framer: BlockFramer,
    footer: LogFooter,
    last_sequence: Option<SequenceNumber>,
    offset: u64,
    closed: bool,
}

impl BlobLogWriter {
    /// Starts a new file on an empty stream and writes its header.
    ///
    /// # Errors
    ///
    /// - [`LogError::InvalidConfig`] if `config` fails validation
    /// - [`LogError::StreamNotEmpty`] if the stream already holds bytes
    /// - [`LogError::Storage`] if the header cannot be written
    pub fn open(mut backend: Box<dyn StorageBackend>, config: LogConfig) -> LogResult<Self> {
        config.validate()?;

        let size = backend.size()?;
        if size != 0 {
            return Err(LogError::StreamNotEmpty { size });
        }

        let mut header = LogHeader::new(config.compression);
        if let Some(range) = config.ttl_guess {
            header = header.with_ttl_guess(range);
        }
        if let Some(range) = config.timestamp_guess {
            header = header.with_timestamp_guess(range);
        }

        backend.append(&header.encode())?;
        if config.sync_on_append {
            backend.flush()?;
        }

        tracing::debug!(
            block_size = config.block_size,
            compression = %config.compression,
            "opened blob log writer"
        );

        Ok(Self {
            backend,
            framer: BlockFramer::new(config.block_size),
            config,
            header,
            footer: LogFooter::default(),
            last_sequence: None,
            offset: LogHeader::SIZE as u64,
            closed: false,
        })
    }

    /// Appends one record.
    ///
    /// A TTL or timestamp of `u64::MAX` is the same as `None`.
    ///
    /// # Errors
    ///
    /// - [`LogError::WriterClosed`] after [`close`](Self::close) or a failed write or flush
    /// - [`LogError::SequenceOrderViolation`] if `sequence` is below one already appended
    /// - [`LogError::RecordTooLarge`] if the key or blob exceeds its configured limit
    /// - [`LogError::Storage`] if the write fails
    ///
    /// On error nothing is added to the footer aggregates.
    pub fn append(
        &mut self,
        key: &[u8],
        blob: &[u8],
        ttl: Option<u64>,
        timestamp: Option<u64>,
        sequence: SequenceNumber,
    ) -> LogResult<RecordLocation> {
        if self.closed {
            return Err(LogError::WriterClosed);
        }
        if let Some(last) = self.last_sequence {
            if sequence < last {
                return Err(LogError::SequenceOrderViolation {
                    last: last.as_u64(),
                    attempted: sequence.as_u64(),
                });
            }
        }
        if key.len() as u64 > u64::from(self.config.max_key_size) {
            return Err(LogError::RecordTooLarge {
                what: "key",
                size: key.len() as u64,
                limit: u64::from(self.config.max_key_size),
            });
        }
        if blob.len() as u64 > self.config.max_blob_size {
            return Err(LogError::RecordTooLarge {
                what: "blob",
                size: blob.len() as u64,
                limit: self.config.max_blob_size,
            });
        }

        let ttl = ttl.filter(|&t| t != NO_TTL);
        let timestamp = timestamp.filter(|&t| t != NO_TIMESTAMP);
        let record = encode_record(key, blob, ttl, timestamp, sequence)?;

        // Framing state advances only once the bytes are in the stream.
        let mut framer = self.framer.clone();
        let mut framed = Vec::with_capacity(record.len() + record.len() / 8 + 16);
        let shape = framer.frame(&record, &mut framed);

        let mut written = self.backend.append(&framed);
        if self.config.sync_on_append {
            if let Ok(at) = written {
                written = self.backend.flush().map(|()| at);
            }
        }
        // After a failed write or flush the stream position is unknown.
        let written_at = match written {
            Ok(at) => at,
            Err(e) => {
                self.closed = true;
                tracing::warn!(offset = self.offset, error = %e, "blob log append failed; writer closed");
                return Err(e.into());
            }
        };

        self.framer = framer;
        self.footer.observe(ttl, timestamp, sequence);
        self.last_sequence = Some(sequence);
        self.offset = written_at + framed.len() as u64;

        let location = RecordLocation {
            offset: written_at + shape.padding as u64,
            length: (framed.len() - shape.padding) as u64,
        };
        tracing::trace!(
            %sequence,
            %location,
            fragments = shape.fragments,
            "appended blob record"
        );
        Ok(location)
    }

    /// Appends an owned record. See [`append`](Self::append).
    ///
    /// # Errors
    ///
    /// Same as [`append`](Self::append).
    pub fn append_record(&mut self, record: &BlobRecord) -> LogResult<RecordLocation> {
        self.append(
            &record.key,
            &record.blob,
            record.ttl,
            record.timestamp,
            record.sequence,
        )
    }

    /// Writes the footer and seals the file.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::WriterClosed`] if already closed, or a storage
    /// error if the footer cannot be written or synced.
    pub fn close(&mut self) -> LogResult<FooterSummary> {
        if self.closed {
            return Err(LogError::WriterClosed);
        }
        self.closed = true;

        let at = self.backend.append(&self.footer.encode())?;
        if self.config.sync_on_close {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }

        let file_size = at + LogFooter::SIZE as u64;
        self.offset = file_size;

        tracing::debug!(
            records = self.footer.record_count(),
            file_size,
            "sealed blob log"
        );

        Ok(FooterSummary {
            footer: self.footer,
            file_size,
        })
    }

    /// Header written at open.
    #[must_use]
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// Offset where the next append will land.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Records appended so far.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.footer.record_count()
    }

    /// Footer aggregates accumulated so far.
    #[must_use]
    pub fn aggregates(&self) -> &LogFooter {
        &self.footer
    }

    /// Whether the writer no longer accepts appends.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The underlying stream.
    #[must_use]
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Releases the stream, typically to open a reader on it.
    #[must_use]
    pub fn into_backend(self) -> Box<dyn StorageBackend> {
        self.backend
    }
}

impl fmt::Debug for BlobLogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobLogWriter")
            .field("block_size", &self.config.block_size)
            .field("offset", &self.offset)
            .field("records", &self.footer.record_count())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
