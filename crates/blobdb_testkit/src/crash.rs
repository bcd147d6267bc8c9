//! Crash simulation for blob log writers.
//!
//! A [`CrashableBackend`] stops accepting bytes after a configured total,
//! keeping only the prefix of the write that crosses the limit. Reading the
//! surviving bytes back shows what recovery sees after a power loss at that
//! exact point.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blobdb_testkit::crash::simulate_crash;
//!
//! let outcome = simulate_crash(&config, &records, 300);
//! assert_eq!(outcome.report.record_count(), outcome.appended);
//! ```

use crate::fixtures::SharedBackend;
use blobdb_log::{
    BlobLogReader, BlobLogWriter, BlobRecord, LogConfig, LogResult, RecoveryMode, RecoveryReport,
};
use blobdb_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        }
    }

    /// Sets the backend to crash once `bytes` bytes have been written in total.
    pub fn crash_after(&self, bytes: usize) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn into_inner(self) -> Box<dyn StorageBackend> {
        self.inner
    }

    fn crash(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(std::io::Error::other(format!("simulated crash during {what}")))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.has_crashed() {
            return Err(self.crash("write"));
        }
        let current = self.bytes_written.load(Ordering::SeqCst);
        let crash_threshold = self.crash_after_bytes.load(Ordering::SeqCst);

        // Check if this write will cross the crash threshold
        if current.saturating_add(bytes.len()) > crash_threshold {
            let partial_len = crash_threshold.saturating_sub(current);
            if partial_len > 0 {
                self.inner.append(&bytes[..partial_len])?;
                self.bytes_written.fetch_add(partial_len, Ordering::SeqCst);
            }
            return Err(self.crash("partial write"));
        }

        let offset = self.inner.append(bytes)?;
        self.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.crash("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.crash("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// What survived a simulated crash.
#[derive(Debug)]
pub struct CrashOutcome {
    /// Bytes on "disk" after the crash.
    pub bytes: Vec<u8>,
    /// Appends that returned successfully before the crash.
    pub appended: usize,
    /// Whether the footer was written.
    pub sealed: bool,
    /// Best-effort scan of the surviving bytes, or the open error if the
    /// header itself did not survive.
    pub report: LogResult<RecoveryReport>,
}

/// Writes `records` and seals the file, crashing after `crash_after` bytes.
pub fn simulate_crash(config: &LogConfig, records: &[BlobRecord], crash_after: usize) -> CrashOutcome {
    let shared = SharedBackend::new();
    let backend = CrashableBackend::new(Box::new(shared.clone()));
    backend.crash_after(crash_after);

    let mut appended = 0;
    let mut sealed = false;
    if let Ok(mut writer) = BlobLogWriter::open(Box::new(backend), config.clone()) {
        for record in records {
            if writer.append_record(record).is_err() {
                break;
            }
            appended += 1;
        }
        if !writer.is_closed() {
            sealed = writer.close().is_ok();
        }
    }
    let bytes = shared.data();

    let survivor = InMemoryBackend::with_data(bytes.clone());
    let config = config.clone().recovery_mode(RecoveryMode::BestEffort);
    let report = BlobLogReader::open(&survivor, &config).and_then(BlobLogReader::recover);

    CrashOutcome {
        bytes,
        appended,
        sealed,
        report,
    }
}
