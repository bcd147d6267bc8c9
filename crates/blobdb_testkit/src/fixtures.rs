//! Test fixtures for blob log files.
//!
//! Provides helpers for writing logs to memory or to temporary files and
//! for damaging them in controlled ways.

use blobdb_log::log::FRAME_HEADER_SIZE;
use blobdb_log::format::{RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE};
use blobdb_log::{
    BlobLogReader, BlobLogWriter, BlobRecord, LogConfig, LogResult, RecordLocation, RecoveryMode,
    RecoveryReport, SequenceNumber,
};
use blobdb_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A blob log written to memory, with the locations of its records.
pub struct TestLog {
    backend: InMemoryBackend,
    config: LogConfig,
    records: Vec<BlobRecord>,
    locations: Vec<RecordLocation>,
}

impl TestLog {
    /// Writes `records` with `config`, sealing the file if `seal` is set.
    pub fn build(config: &LogConfig, records: &[BlobRecord], seal: bool) -> Self {
        let mut writer = BlobLogWriter::open(Box::new(InMemoryBackend::new()), config.clone())
            .expect("Failed to open writer");
        let locations = records
            .iter()
            .map(|r| writer.append_record(r).expect("Failed to append record"))
            .collect();
        if seal {
            writer.close().expect("Failed to seal log");
        }

        Self {
            backend: InMemoryBackend::with_data(read_all(writer.into_backend().as_ref())),
            config: config.clone(),
            records: records.to_vec(),
            locations,
        }
    }

    /// The underlying stream.
    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }

    /// Configuration the log was written with.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Records as appended.
    pub fn records(&self) -> &[BlobRecord] {
        &self.records
    }

    /// Location returned for each appended record.
    pub fn locations(&self) -> &[RecordLocation] {
        &self.locations
    }

    /// Current file image.
    pub fn bytes(&self) -> Vec<u8> {
        self.backend.data()
    }

    /// Current file size.
    pub fn len(&self) -> u64 {
        self.backend.data().len() as u64
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flips one bit.
    pub fn flip_bit(&self, offset: u64, bit: u8) {
        self.backend
            .modify(|data| data[offset as usize] ^= 1 << (bit % 8));
    }

    /// Overwrites bytes in place.
    pub fn overwrite(&self, offset: u64, bytes: &[u8]) {
        self.backend.modify(|data| {
            let at = offset as usize;
            data[at..at + bytes.len()].copy_from_slice(bytes);
        });
    }

    /// Cuts the file to `len` bytes, as a torn write would.
    pub fn truncate(&self, len: u64) {
        self.backend.modify(|data| data.truncate(len as usize));
    }

    /// Opens a reader with the log's own configuration.
    pub fn reader(&self) -> LogResult<BlobLogReader<'_>> {
        BlobLogReader::open(&self.backend, &self.config)
    }

    /// Scans the whole log with the log's own configuration.
    pub fn recover(&self) -> LogResult<RecoveryReport> {
        self.reader()?.recover()
    }

    /// Scans the whole log in the given mode.
    pub fn recover_with(&self, mode: RecoveryMode) -> LogResult<RecoveryReport> {
        let config = self.config.clone().recovery_mode(mode);
        BlobLogReader::open(&self.backend, &config)?.recover()
    }
}

/// Reads an entire stream into memory.
pub fn read_all(backend: &dyn StorageBackend) -> Vec<u8> {
    let size = backend.size().expect("Failed to get stream size");
    backend
        .read_at(0, size as usize)
        .expect("Failed to read stream")
}

/// An in-memory stream whose bytes outlive the writer that owns it.
///
/// Clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBackend {
    inner: Arc<InMemoryBackend>,
}

impl SharedBackend {
    /// Creates an empty shared stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stream contents.
    pub fn data(&self) -> Vec<u8> {
        self.inner.data()
    }
}

impl StorageBackend for SharedBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut offset = 0;
        self.inner.modify(|data| {
            offset = data.len() as u64;
            data.extend_from_slice(bytes);
        });
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let size = self.inner.size()?;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        self.inner.modify(|data| data.truncate(new_size as usize));
        Ok(())
    }
}

/// A record whose frame fills exactly one block of `block_size` bytes
/// when written at a block boundary.
pub fn block_filling_record(block_size: u32, sequence: u64) -> BlobRecord {
    let payload = block_size as usize - FRAME_HEADER_SIZE - RECORD_HEADER_SIZE - RECORD_TRAILER_SIZE;
    let key_len = payload.min(8);
    let key = sequence.to_be_bytes()[8 - key_len..].to_vec();
    let blob = vec![sequence as u8; payload - key_len];
    BlobRecord::new(key, blob, SequenceNumber::new(sequence))
}

/// `count` records with keys `key-N`, `blob_len`-byte blobs and sequence numbers `1..=count`.
pub fn numbered_records(count: u64, blob_len: usize) -> Vec<BlobRecord> {
    (1..=count)
        .map(|i| {
            BlobRecord::new(
                format!("key-{i}").into_bytes(),
                vec![(i % 251) as u8; blob_len],
                SequenceNumber::new(i),
            )
        })
        .collect()
}

/// A blob file in a temporary directory.
pub struct TestFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestFile {
    /// Creates an empty temporary directory and a path for `name` within it.
    pub fn new(name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: temp_dir.path().join(name),
            _temp_dir: temp_dir,
        }
    }

    /// Writes `records` to the file.
    pub fn write(&self, config: &LogConfig, records: &[BlobRecord], seal: bool) -> Vec<RecordLocation> {
        let backend = FileBackend::open_with_create_dirs(&self.path).expect("Failed to create blob file");
        let mut writer =
            BlobLogWriter::open(Box::new(backend), config.clone()).expect("Failed to open writer");
        let locations = records
            .iter()
            .map(|r| writer.append_record(r).expect("Failed to append record"))
            .collect();
        if seal {
            writer.close().expect("Failed to seal blob file");
        }
        locations
    }

    /// Path of the blob file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for reading.
    pub fn open_read_only(&self) -> FileBackend {
        FileBackend::open_read_only(&self.path).expect("Failed to open blob file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_filling_record_fills_block() {
        for block_size in [64u32, 128, 4096] {
            let config = LogConfig::default().block_size(block_size);
            let records: Vec<_> = (1..=3).map(|i| block_filling_record(block_size, i)).collect();
            let log = TestLog::build(&config, &records, false);

            for (i, location) in log.locations().iter().enumerate() {
                assert_eq!(location.length, u64::from(block_size));
                assert_eq!(location.offset, 44 + i as u64 * u64::from(block_size));
            }
        }
    }

    #[test]
    fn damage_helpers() {
        let log = TestLog::build(&LogConfig::default(), &numbered_records(2, 10), true);
        let before = log.bytes();

        log.flip_bit(60, 1);
        assert_eq!(log.bytes()[60], before[60] ^ 0b10);

        log.overwrite(70, &[0xAA, 0xBB]);
        assert_eq!(&log.bytes()[70..72], &[0xAA, 0xBB]);

        log.truncate(50);
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn shared_backend_clones_see_appends() {
        let shared = SharedBackend::new();
        let mut writer_side = shared.clone();
        assert_eq!(writer_side.append(b"abc").unwrap(), 0);
        assert_eq!(writer_side.append(b"de").unwrap(), 3);
        assert_eq!(shared.data(), b"abcde");
        assert!(writer_side.truncate(10).is_err());
        writer_side.truncate(1).unwrap();
        assert_eq!(shared.size().unwrap(), 1);
    }

    #[test]
    fn test_file_round_trip() {
        let file = TestFile::new("nested/dir/test.blob");
        let config = LogConfig::default();
        file.write(&config, &numbered_records(3, 20), true);

        let backend = file.open_read_only();
        let report = BlobLogReader::open(&backend, &config).unwrap().recover().unwrap();
        assert_eq!(report.record_count(), 3);
    }
}
