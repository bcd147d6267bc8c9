//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and logs that respect the
//! writer's contract: TTLs and timestamps never use the on-disk "absent"
//! value, and sequence numbers within a log never decrease.

use blobdb_log::{
    BlobRecord, CompressionType, LogConfig, SequenceNumber, ValueRange, MIN_BLOCK_SIZE,
};
use proptest::prelude::*;

/// Strategy for keys (arbitrary bytes, possibly empty).
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for blobs up to `max_len` bytes.
pub fn blob_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Strategy for an optional TTL or timestamp.
pub fn optional_value_strategy() -> impl Strategy<Value = Option<u64>> {
    prop::option::of(0..u64::MAX)
}

/// Strategy for a single record with blobs up to `max_blob` bytes.
pub fn record_strategy(max_blob: usize) -> impl Strategy<Value = BlobRecord> {
    (
        key_strategy(),
        blob_strategy(max_blob),
        optional_value_strategy(),
        optional_value_strategy(),
        any::<u64>(),
    )
        .prop_map(|(key, blob, ttl, timestamp, sequence)| BlobRecord {
            key,
            blob,
            ttl,
            timestamp,
            sequence: SequenceNumber::new(sequence),
        })
}

/// Strategy for the records of one log, in non-decreasing sequence order.
pub fn record_batch_strategy(
    max_records: usize,
    max_blob: usize,
) -> impl Strategy<Value = Vec<BlobRecord>> {
    prop::collection::vec(record_strategy(max_blob), 0..=max_records).prop_map(|mut records| {
        let mut sequences: Vec<u64> = records.iter().map(|r| r.sequence.as_u64()).collect();
        sequences.sort_unstable();
        for (record, seq) in records.iter_mut().zip(sequences) {
            record.sequence = SequenceNumber::new(seq);
        }
        records
    })
}

/// Strategy for small block sizes, so that records span many blocks.
pub fn block_size_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![
        Just(MIN_BLOCK_SIZE),
        MIN_BLOCK_SIZE..1024u32,
        Just(4096u32),
    ]
}

/// Strategy for compression tags.
pub fn compression_strategy() -> impl Strategy<Value = CompressionType> {
    (0u8..8).prop_map(|b| CompressionType::from_byte(b).unwrap_or_default())
}

/// Strategy for a valid (low <= high) range.
pub fn range_strategy() -> impl Strategy<Value = ValueRange> {
    (any::<u64>(), any::<u64>()).prop_map(|(a, b)| ValueRange::new(a.min(b), a.max(b)))
}

/// Strategy for writer configurations.
pub fn config_strategy() -> impl Strategy<Value = LogConfig> {
    (
        block_size_strategy(),
        compression_strategy(),
        prop::option::of(range_strategy()),
        prop::option::of(range_strategy()),
    )
        .prop_map(|(block_size, compression, ttl_guess, timestamp_guess)| {
            let mut config = LogConfig::default()
                .block_size(block_size)
                .compression(compression);
            config.ttl_guess = ttl_guess;
            config.timestamp_guess = timestamp_guess;
            config
        })
}
