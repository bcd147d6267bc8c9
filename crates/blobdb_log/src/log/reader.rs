//! Sequential blob log reader.
//!
//! A reader validates the header on [`open`](BlobLogReader::open), then
//! walks the record region frame by frame, reassembling fragments and
//! decoding records. The region ends at the footer of a sealed file, or
//! at end of stream for a file whose writer never closed.
//!
//! # Corruption handling
//!
//! In [`RecoveryMode::Strict`] the first damaged frame or record is
//! returned as [`LogError::Corrupted`] and the reader stops. In
//! [`RecoveryMode::BestEffort`] it is yielded as a
//! [`LogEntry::Corruption`] event and scanning resumes:
//!
//! - after a bad frame, at the next block boundary
//! - after a record that fails to decode, at the first block boundary at
//!   or after the end of its last fragment
//! - after an out-of-order fragment, at the next frame, or at the fragment
//!   itself when it begins a new record
//!
//! After a resync, `Middle` and `Last` fragments belonging to a record
//! whose start was lost are skipped without further events, so each
//! damaged region is reported once. Only records within the damaged
//! blocks are lost.

use crate::config::{LogConfig, RecoveryMode};
use crate::error::{LogError, LogResult};
use crate::format::{BlobRecord, LogFooter, LogHeader, RecordHeader, RecordType, FOOTER_MAGIC, RECORD_HEADER_SIZE};
use crate::log::framer::{FragmentAssembler, Frame, FRAME_HEADER_SIZE, MIN_FRAGMENT_SIZE};
use crate::types::RecordLocation;
use blobdb_storage::{StorageBackend, StorageError};
use std::fmt;

/// Where a reader is in its scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// More entries may follow.
    Scanning,
    /// A strict reader hit corruption and stopped.
    Corrupted,
    /// The record region is exhausted, or a storage error ended the scan.
    Done,
}

/// A damaged region reported by a best-effort reader.
#[derive(Debug)]
pub struct CorruptionEvent {
    /// File offset of the damaged frame or the first fragment of the damaged record.
    pub offset: u64,
    /// What was wrong.
    pub error: LogError,
}

impl fmt::Display for CorruptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}: {}", self.offset, self.error)
    }
}

/// A decoded record and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// The record.
    pub record: BlobRecord,
    /// Its first frame and span in the file.
    pub location: RecordLocation,
}

/// One item of a scan.
#[derive(Debug)]
pub enum LogEntry {
    /// A valid record.
    Record(ReadRecord),
    /// A damaged region that was skipped.
    Corruption(CorruptionEvent),
}

/// Everything a full scan produced.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Valid records in file order.
    pub records: Vec<ReadRecord>,
    /// Skipped regions in file order.
    pub events: Vec<CorruptionEvent>,
}

impl RecoveryReport {
    /// Number of records recovered.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Whether the scan saw no corruption.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.events.is_empty()
    }
}

/// Why a scan step did not produce an entry.
enum Fault {
    /// Damaged data; `resume` is where a best-effort scan picks up.
    Corrupt {
        offset: u64,
        error: LogError,
        resume: u64,
    },
    /// The stream itself failed.
    Fatal(LogError),
}

impl From<StorageError> for Fault {
    fn from(e: StorageError) -> Self {
        Fault::Fatal(e.into())
    }
}

/// Holds the block currently being scanned.
struct BlockBuffer {
    base: u64,
    block_size: u64,
    data_end: u64,
    start: u64,
    data: Vec<u8>,
}

impl BlockBuffer {
    fn block_start(&self, pos: u64) -> u64 {
        self.base + (pos - self.base) / self.block_size * self.block_size
    }

    /// Returns `len` bytes at `pos`, which must lie within one block.
    fn get(&mut self, backend: &dyn StorageBackend, pos: u64, len: usize) -> Result<&[u8], StorageError> {
        let loaded_end = self.start + self.data.len() as u64;
        if pos < self.start || pos + len as u64 > loaded_end {
            let start = self.block_start(pos);
            let end = (start + self.block_size).min(self.data_end);
            self.data = backend.read_at(start, (end - start) as usize)?;
            self.start = start;
        }
        let at = (pos - self.start) as usize;
        Ok(&self.data[at..at + len])
    }
}

/// Scans the records of one blob log file.
///
/// Readers borrow the stream immutably, so any number of them may scan a
/// sealed file at once. Each keeps its own cursor; opening a new reader
/// always starts from the first record.
///
/// # Example
///
/// ```rust,ignore
/// let reader = BlobLogReader::open(backend.as_ref(), &LogConfig::default().best_effort())?;
/// let report = reader.recover()?;
/// println!("{} records, {} damaged regions", report.record_count(), report.events.len());
/// ```
pub struct BlobLogReader<'a> {
    backend: &'a dyn StorageBackend,
    mode: RecoveryMode,
    header: LogHeader,
    footer: Option<LogFooter>,
    blocks: BlockBuffer,
    assembler: FragmentAssembler,
    cursor: u64,
    state: ReaderState,
    pending: Option<CorruptionEvent>,
    records_read: u64,
    /// Set by a best-effort resync until the next `Full` or `First` fragment.
    resyncing: bool,
}

impl<'a> BlobLogReader<'a> {
    /// Opens a reader and validates the header.
    ///
    /// If the last bytes of the stream carry the footer magic, the file is
    /// treated as sealed and the footer is decoded.
    ///
    /// # Errors
    ///
    /// - [`LogError::InvalidConfig`] if `config` fails validation
    /// - any [`LogHeader::decode`] error; a bad header is fatal in every mode
    /// - [`LogError::Corrupted`] wrapping a [`LogFooter::decode`] error, in
    ///   strict mode only
    /// - [`LogError::Storage`] if the stream cannot be read
    pub fn open(backend: &'a dyn StorageBackend, config: &LogConfig) -> LogResult<Self> {
        config.validate()?;

        let size = backend.size()?;
        let head_len = size.min(LogHeader::SIZE as u64) as usize;
        let header = LogHeader::decode(&backend.read_at(0, head_len)?)?;

        let mut footer = None;
        let mut pending = None;
        let mut data_end = size;

        let footer_at = size.saturating_sub(LogFooter::SIZE as u64);
        if size >= (LogHeader::SIZE + LogFooter::SIZE) as u64 {
            let tail = backend.read_at(footer_at, LogFooter::SIZE)?;
            if tail[..4] == FOOTER_MAGIC.to_le_bytes() {
                data_end = footer_at;
                match LogFooter::decode(&tail) {
                    Ok(decoded) => footer = Some(decoded),
                    Err(error) => {
                        if config.recovery_mode == RecoveryMode::Strict {
                            return Err(LogError::corrupted(footer_at, error));
                        }
                        tracing::warn!(offset = footer_at, %error, "damaged blob log footer");
                        pending = Some(CorruptionEvent {
                            offset: footer_at,
                            error,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            size,
            sealed = footer.is_some(),
            compression = %header.compression(),
            "opened blob log reader"
        );

        let base = LogHeader::SIZE as u64;
        Ok(Self {
            backend,
            mode: config.recovery_mode,
            header,
            footer,
            blocks: BlockBuffer {
                base,
                block_size: u64::from(config.block_size),
                data_end,
                start: base,
                data: Vec::new(),
            },
            assembler: FragmentAssembler::new(),
            cursor: base,
            state: ReaderState::Scanning,
            pending,
            records_read: 0,
            resyncing: false,
        })
    }

    /// The file header.
    #[must_use]
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// The footer, if the file is sealed and its footer is intact.
    #[must_use]
    pub fn footer(&self) -> Option<&LogFooter> {
        self.footer.as_ref()
    }

    /// Whether a valid footer was found.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.footer.is_some()
    }

    /// Current scan state.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// File offset of the next frame to be read.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.cursor
    }

    /// Valid records yielded so far.
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Scans to the end, collecting records and corruption events.
    ///
    /// # Errors
    ///
    /// In strict mode, the first corruption. In either mode, a storage error.
    pub fn recover(self) -> LogResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for entry in self {
            match entry? {
                LogEntry::Record(record) => report.records.push(record),
                LogEntry::Corruption(event) => report.events.push(event),
            }
        }
        Ok(report)
    }

    fn block_end(&self, pos: u64) -> u64 {
        self.blocks.block_start(pos) + self.blocks.block_size
    }

    fn align_up(&self, pos: u64) -> u64 {
        let start = self.blocks.block_start(pos);
        if start == pos {
            pos
        } else {
            start + self.blocks.block_size
        }
    }

    /// Advances by one frame. `Ok(None)` means nothing to yield yet.
    fn step(&mut self) -> Result<Option<LogEntry>, Fault> {
        let data_end = self.blocks.data_end;
        if self.cursor >= data_end {
            if let Some(offset) = self.assembler.pending_offset() {
                return Err(Fault::Corrupt {
                    offset,
                    error: self.incomplete_record(),
                    resume: data_end,
                });
            }
            self.finish();
            return Ok(None);
        }

        let frame_at = self.cursor;
        let left = self.block_end(frame_at) - frame_at;
        if left < MIN_FRAGMENT_SIZE as u64 {
            self.cursor += left;
            return Ok(None);
        }

        let readable = left.min(data_end - frame_at);
        if readable < FRAME_HEADER_SIZE as u64 {
            let tail = self.blocks.get(self.backend, frame_at, readable as usize)?;
            if tail.iter().all(|&b| b == 0) {
                self.cursor = data_end;
                return Ok(None);
            }
            return Err(Fault::Corrupt {
                offset: self.assembler.pending_offset().unwrap_or(frame_at),
                error: LogError::truncated(FRAME_HEADER_SIZE, readable as usize),
                resume: data_end,
            });
        }

        let frame_bytes = self.blocks.get(self.backend, frame_at, FRAME_HEADER_SIZE)?;
        let frame = match Frame::parse(frame_bytes) {
            Ok(frame) => frame,
            Err(error) => {
                return Err(Fault::Corrupt {
                    offset: frame_at,
                    error,
                    resume: self.block_end(frame_at),
                })
            }
        };

        let (record_type, len) = match frame {
            Frame::Padding => {
                self.cursor = self.block_end(frame_at);
                return Ok(None);
            }
            Frame::Fragment { record_type, len } => (record_type, u64::from(len)),
        };

        let span = FRAME_HEADER_SIZE as u64 + len;
        if span > left {
            return Err(Fault::Corrupt {
                offset: frame_at,
                error: LogError::fragment_sequence(format!(
                    "{record_type:?} fragment of {len} bytes overruns its block"
                )),
                resume: self.block_end(frame_at),
            });
        }
        if span > readable {
            return Err(Fault::Corrupt {
                offset: self.assembler.pending_offset().unwrap_or(frame_at),
                error: LogError::TruncatedInput {
                    needed: span,
                    available: readable,
                },
                resume: data_end,
            });
        }

        let in_progress = self.assembler.pending_offset();
        match record_type {
            RecordType::Middle | RecordType::Last if self.resyncing && in_progress.is_none() => {
                tracing::trace!(offset = frame_at, ?record_type, "skipped fragment of a damaged record");
                self.cursor = frame_at + span;
                return Ok(None);
            }
            RecordType::Full | RecordType::First => self.resyncing = false,
            RecordType::Middle | RecordType::Last => {}
        }

        let payload = self
            .blocks
            .get(self.backend, frame_at + FRAME_HEADER_SIZE as u64, len as usize)?;
        let pushed = self.assembler.push(frame_at, record_type, payload);
        self.cursor = frame_at + span;

        match pushed {
            Ok(None) => Ok(None),
            Ok(Some((start, bytes))) => self.decode(start, &bytes),
            Err(error) => {
                // The frame itself parsed and fit its block, so the chain of
                // frames is intact. A fragment that starts a record is re-read.
                let resume = match record_type {
                    RecordType::Full | RecordType::First => frame_at,
                    RecordType::Middle | RecordType::Last => self.cursor,
                };
                Err(Fault::Corrupt {
                    offset: in_progress.unwrap_or(frame_at),
                    error,
                    resume,
                })
            }
        }
    }

    fn decode(&mut self, start: u64, bytes: &[u8]) -> Result<Option<LogEntry>, Fault> {
        match BlobRecord::decode(bytes) {
            Ok(record) => {
                self.records_read += 1;
                let location = RecordLocation {
                    offset: start,
                    length: self.cursor - start,
                };
                tracing::trace!(sequence = %record.sequence, %location, "read blob record");
                Ok(Some(LogEntry::Record(ReadRecord { record, location })))
            }
            Err(error) => Err(Fault::Corrupt {
                offset: start,
                error,
                resume: self.align_up(self.cursor),
            }),
        }
    }

    /// Error for a fragment chain cut off by the end of the record region.
    fn incomplete_record(&self) -> LogError {
        let buffered = self.assembler.pending_bytes();
        let available = buffered.len() as u64;
        let needed = RecordHeader::decode(buffered)
            .map(|h| h.record_len())
            .unwrap_or(RECORD_HEADER_SIZE as u64)
            .max(available + 1);
        LogError::TruncatedInput { needed, available }
    }

    fn finish(&mut self) {
        self.state = ReaderState::Done;
        if let Some(footer) = &self.footer {
            if footer.record_count() != self.records_read {
                tracing::warn!(
                    footer = footer.record_count(),
                    read = self.records_read,
                    "blob log record count differs from footer"
                );
            }
        }
        tracing::debug!(records = self.records_read, "blob log scan complete");
    }
}

impl Iterator for BlobLogReader<'_> {
    type Item = LogResult<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state != ReaderState::Scanning {
                return None;
            }
            if let Some(event) = self.pending.take() {
                return Some(Ok(LogEntry::Corruption(event)));
            }

            match self.step() {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => {}
                Err(Fault::Fatal(error)) => {
                    self.state = ReaderState::Done;
                    return Some(Err(error));
                }
                Err(Fault::Corrupt {
                    offset,
                    error,
                    resume,
                }) => {
                    self.assembler.reset();
                    tracing::warn!(offset, %error, mode = ?self.mode, "blob log corruption");
                    match self.mode {
                        RecoveryMode::Strict => {
                            self.state = ReaderState::Corrupted;
                            return Some(Err(LogError::corrupted(offset, error)));
                        }
                        RecoveryMode::BestEffort => {
                            self.cursor = resume;
                            self.resyncing = true;
                            return Some(Ok(LogEntry::Corruption(CorruptionEvent {
                                offset,
                                error,
                            })));
                        }
                    }
                }
            }
        }
    }
}

impl fmt::Debug for BlobLogReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobLogReader")
            .field("mode", &self.mode)
            .field("sealed", &self.footer.is_some())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}
