//! Byte-exact test vectors for the blob log format.
//!
//! Any implementation of format version 1 must produce these bytes for
//! these inputs. The vectors serialize to JSON so other tooling can check
//! against the same data.

use blobdb_log::{
    BlobLogWriter, BlobRecord, CompressionType, LogConfig, LogFooter, LogHeader, SequenceNumber,
    ValueRange,
};
use blobdb_storage::{InMemoryBackend, StorageBackend};
use serde::{Deserialize, Serialize};

/// A named encoding and the bytes it must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Expected encoding (hex).
    pub expected_hex: String,
}

impl TestVector {
    fn new(id: &str, description: &str, expected_hex: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_hex: expected_hex.into(),
        }
    }

    /// Decodes [`expected_hex`](Self::expected_hex).
    pub fn expected_bytes(&self) -> Vec<u8> {
        hex_decode(&self.expected_hex).expect("Invalid hex in test vector")
    }
}

/// Header encoding vectors.
pub fn header_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new(
            "header_empty",
            "No compression, no hints",
            "378f240001000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        TestVector::new(
            "header_hints",
            "LZ4, TTL hint [100, 200], timestamp hint [1000, 2000]",
            "378f240001000000010204006400000000000000c800000000000000e803000000000000d007000000000000",
        ),
    ]
}

/// Footer encoding vectors.
pub fn footer_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new(
            "footer_empty",
            "Zero records, all ranges absent",
            "388f2400000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        TestVector::new(
            "footer_seq",
            "Sequences 5, 7, 9, 12 without TTL or timestamp",
            "388f24000000000004000000000000000000000000000000000000000000000005000000000000000c0000000000000000000000000000000000000000000000",
        ),
        TestVector::new(
            "footer_full",
            "Three records, TTL [60, 3600], sequences [1, 3], timestamps [1700000000, 1700000500]",
            "388f24000102000003000000000000003c00000000000000100e0000000000000100000000000000030000000000000000f1536500000000f4f2536500000000",
        ),
    ]
}

/// Record encoding vectors.
pub fn record_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new(
            "record_plain",
            "key \"k\", blob \"blob\", no TTL, no timestamp, sequence 7",
            "20de736991cbfbb9010000000400000000000000ffffffffffffffffffffffffffffffff0000000000006b626c6f62070000000000000070d6e76f",
        ),
        TestVector::new(
            "record_ttl",
            "key \"user:1\", empty blob, TTL 60, sequence 42",
            "1ddfa75182c2a57b0600000000000000000000003c00000000000000ffffffffffffffff000100000000757365723a312a00000000000000f7a1940d",
        ),
        TestVector::new(
            "record_ts",
            "key \"a\", blob \"xyz\", timestamp 1234, sequence 1",
            "8dbf0f110f2c11b6010000000300000000000000ffffffffffffffffd2040000000000000002000000006178797a0100000000000000f7df88a9",
        ),
    ]
}

/// Whole-file vectors.
pub fn file_vectors() -> Vec<TestVector> {
    vec![TestVector::new(
        "file_one_record",
        "Default config, record_plain appended and sealed",
        "378f240001000000000000000000000000000000000000000000000000000000000000000000000000000000003b00000020de736991cbfbb9010000000400000000000000ffffffffffffffffffffffffffffffff0000000000006b626c6f62070000000000000070d6e76f388f2400000000000100000000000000000000000000000000000000000000000700000000000000070000000000000000000000000000000000000000000000",
    )]
}

/// Encodes the value each vector describes.
pub fn encode_vector(id: &str) -> Option<Vec<u8>> {
    let seq = SequenceNumber::new;
    let bytes = match id {
        "header_empty" => LogHeader::new(CompressionType::None).encode().to_vec(),
        "header_hints" => LogHeader::new(CompressionType::Lz4)
            .with_ttl_guess(ValueRange::new(100, 200))
            .with_timestamp_guess(ValueRange::new(1000, 2000))
            .encode()
            .to_vec(),
        "footer_empty" => LogFooter::default().encode().to_vec(),
        "footer_seq" => footer_of(&[5, 7, 9, 12], &[], &[]),
        "footer_full" => footer_of(&[1, 2, 3], &[3600, 60], &[1_700_000_500, 1_700_000_000]),
        "record_plain" => BlobRecord::new(b"k".to_vec(), b"blob".to_vec(), seq(7))
            .encode()
            .ok()?,
        "record_ttl" => BlobRecord::new(b"user:1".to_vec(), Vec::new(), seq(42))
            .with_ttl(60)
            .encode()
            .ok()?,
        "record_ts" => BlobRecord::new(b"a".to_vec(), b"xyz".to_vec(), seq(1))
            .with_timestamp(1234)
            .encode()
            .ok()?,
        "file_one_record" => {
            let mut writer =
                BlobLogWriter::open(Box::new(InMemoryBackend::new()), LogConfig::default()).ok()?;
            writer.append(b"k", b"blob", None, None, seq(7)).ok()?;
            writer.close().ok()?;
            let backend = writer.into_backend();
            let size = backend.size().ok()?;
            backend.read_at(0, size as usize).ok()?
        }
        _ => return None,
    };
    Some(bytes)
}

/// Footer a writer produces for the given per-record values.
fn footer_of(sequences: &[u64], ttls: &[u64], timestamps: &[u64]) -> Vec<u8> {
    let mut writer = BlobLogWriter::open(Box::new(InMemoryBackend::new()), LogConfig::default())
        .expect("Failed to open writer");
    for (i, &sequence) in sequences.iter().enumerate() {
        writer
            .append(
                b"k",
                b"",
                ttls.get(i).copied(),
                timestamps.get(i).copied(),
                SequenceNumber::new(sequence),
            )
            .expect("Failed to append");
    }
    writer.close().expect("Failed to close").footer.encode().to_vec()
}

/// Hex-encodes bytes.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes a hex string.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// All vectors.
pub fn all_vectors() -> Vec<TestVector> {
    let mut vectors = header_vectors();
    vectors.extend(footer_vectors());
    vectors.extend(record_vectors());
    vectors.extend(file_vectors());
    vectors
}
