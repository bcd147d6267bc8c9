//! Fuzz targets for blob log decoding.
//!
//! Each target takes arbitrary bytes and must return without panicking.
//! They can be driven by cargo-fuzz or by the proptest wrappers below.

use blobdb_log::{
    BlobLogReader, BlobRecord, CompressionType, LogConfig, LogEntry, LogFooter, LogHeader,
    RecordHeader,
};
use blobdb_storage::InMemoryBackend;

/// Fuzz target for the header, footer and record decoders.
pub fn fuzz_decoders(data: &[u8]) {
    let _ = LogHeader::decode(data);
    let _ = LogFooter::decode(data);
    if let Ok(header) = RecordHeader::decode(data) {
        // A verified header must describe a length consistent with itself.
        assert!(header.record_len() >= header.payload_len());
    }
    let _ = BlobRecord::decode(data);
}

/// Fuzz target for the reader.
///
/// Prepends a valid header to `data` and scans it in best-effort mode with
/// a small block size. Returns the number of entries produced.
pub fn fuzz_reader(data: &[u8]) -> usize {
    let mut file = LogHeader::new(CompressionType::None).encode().to_vec();
    file.extend_from_slice(data);
    let backend = InMemoryBackend::with_data(file);

    let config = LogConfig::default().block_size(64).best_effort();
    let reader = match BlobLogReader::open(&backend, &config) {
        Ok(reader) => reader,
        Err(_) => return 0,
    };

    let mut entries = 0;
    for entry in reader {
        match entry {
            Ok(LogEntry::Record(_)) | Ok(LogEntry::Corruption(_)) => entries += 1,
            Err(_) => break,
        }
        // Every entry consumes at least one frame, so a scan is bounded by
        // the number of frames that fit in the input.
        assert!(entries <= data.len() / 5 + 2, "reader failed to make progress");
    }
    entries
}
