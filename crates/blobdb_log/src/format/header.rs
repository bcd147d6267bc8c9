//! Blob log file header.

use super::{ByteReader, ByteWriter, RangeFlags};
use crate::error::{LogError, LogResult};
use crate::types::{CompressionType, ValueRange};

/// Magic number opening every blob log file.
pub const HEADER_MAGIC: u32 = 0x0024_8F37;

/// Highest header version this build reads and the one it writes.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed metadata written once at the start of a blob log file.
///
/// The TTL and timestamp ranges are hints chosen when the file is created;
/// the footer carries the exact ranges once the file is sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    version: u32,
    compression: CompressionType,
    ttl_guess: Option<ValueRange>,
    timestamp_guess: Option<ValueRange>,
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::new(CompressionType::None)
    }
}

impl LogHeader {
    /// Encoded size: magic + version + flags + ttl range + timestamp range.
    pub const SIZE: usize = 4 + 4 + 4 + 8 * 2 + 8 * 2;

    /// Creates a header for a new file with no range hints.
    #[must_use]
    pub fn new(compression: CompressionType) -> Self {
        Self {
            version: FORMAT_VERSION,
            compression,
            ttl_guess: None,
            timestamp_guess: None,
        }
    }

    /// Adds a TTL range hint.
    #[must_use]
    pub fn with_ttl_guess(mut self, range: ValueRange) -> Self {
        self.ttl_guess = Some(range);
        self
    }

    /// Adds a timestamp range hint.
    #[must_use]
    pub fn with_timestamp_guess(mut self, range: ValueRange) -> Self {
        self.timestamp_guess = Some(range);
        self
    }

    /// Format version recorded in the file.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Compression tag recorded in the file.
    #[must_use]
    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Returns whether a TTL hint is present.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.ttl_guess.is_some()
    }

    /// Returns whether a timestamp hint is present.
    #[must_use]
    pub fn has_timestamp(&self) -> bool {
        self.timestamp_guess.is_some()
    }

    /// TTL hint, if any.
    #[must_use]
    pub fn ttl_guess(&self) -> Option<ValueRange> {
        self.ttl_guess
    }

    /// Timestamp hint, if any.
    #[must_use]
    pub fn timestamp_guess(&self) -> Option<ValueRange> {
        self.timestamp_guess
    }

    /// TTL hint bounds, `(0, 0)` when absent.
    #[must_use]
    pub fn ttl_range(&self) -> (u64, u64) {
        self.ttl_guess.unwrap_or_default().as_pair()
    }

    /// Timestamp hint bounds, `(0, 0)` when absent.
    #[must_use]
    pub fn timestamp_range(&self) -> (u64, u64) {
        self.timestamp_guess.unwrap_or_default().as_pair()
    }

    /// Encodes the header to its fixed 44-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        let mut w = ByteWriter::new(&mut buf);
        w.put_u32(HEADER_MAGIC);
        w.put_u32(self.version);
        w.put_u32(
            RangeFlags {
                has_ttl: self.has_ttl(),
                has_timestamp: self.has_timestamp(),
                extra: self.compression.as_byte(),
            }
            .encode(),
        );
        w.put_range(self.ttl_guess);
        w.put_range(self.timestamp_guess);
        buf
    }

    /// Decodes a header from the first 44 bytes of `input`.
    ///
    /// # Errors
    ///
    /// - [`LogError::TruncatedInput`] if fewer than 44 bytes are given
    /// - [`LogError::BadMagic`] if the magic number is wrong
    /// - [`LogError::UnsupportedVersion`] if the version is newer than [`FORMAT_VERSION`]
    /// - [`LogError::InvalidFlags`] / [`LogError::UnknownCompression`] for bad flag bytes
    pub fn decode(input: &[u8]) -> LogResult<Self> {
        if input.len() < Self::SIZE {
            return Err(LogError::truncated(Self::SIZE, input.len()));
        }
        let mut r = ByteReader::new(&input[..Self::SIZE]);

        let magic = r.u32();
        if magic != HEADER_MAGIC {
            return Err(LogError::BadMagic {
                expected: HEADER_MAGIC,
                actual: magic,
            });
        }

        let version = r.u32();
        if version > FORMAT_VERSION {
            return Err(LogError::UnsupportedVersion {
                version,
                max: FORMAT_VERSION,
            });
        }

        let flags = RangeFlags::decode(r.u32())?;
        let compression = CompressionType::from_byte(flags.extra)
            .ok_or(LogError::UnknownCompression(flags.extra))?;

        let ttl = r.range();
        let ts = r.range();

        Ok(Self {
            version,
            compression,
            ttl_guess: flags.has_ttl.then_some(ttl),
            timestamp_guess: flags.has_timestamp.then_some(ts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_44() {
        assert_eq!(LogHeader::SIZE, 44);
        assert_eq!(LogHeader::default().encode().len(), 44);
    }

    #[test]
    fn header_roundtrip_without_hints() {
        let header = LogHeader::new(CompressionType::Snappy);
        let decoded = LogHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert!(!decoded.has_ttl());
        assert!(!decoded.has_timestamp());
        assert_eq!(decoded.ttl_range(), (0, 0));
        assert_eq!(decoded.timestamp_range(), (0, 0));
    }

    #[test]
    fn header_roundtrip_with_hints() {
        let header = LogHeader::new(CompressionType::Zstd)
            .with_ttl_guess(ValueRange::new(1_000, 2_000))
            .with_timestamp_guess(ValueRange::new(0, 0));
        let decoded = LogHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.compression(), CompressionType::Zstd);
        assert_eq!(decoded.ttl_guess(), Some(ValueRange::new(1_000, 2_000)));
        // A zero-valued range is still present.
        assert_eq!(decoded.timestamp_guess(), Some(ValueRange::new(0, 0)));
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = LogHeader::new(CompressionType::Lz4)
            .with_ttl_guess(ValueRange::new(5, 6))
            .encode();
        assert_eq!(&bytes[0..4], &HEADER_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &[1, 0, 4, 0]);
        assert_eq!(&bytes[12..20], &5u64.to_le_bytes());
        assert_eq!(&bytes[20..28], &6u64.to_le_bytes());
        assert_eq!(&bytes[28..44], &[0u8; 16]);
    }

    #[test]
    fn decode_truncated_fails() {
        let bytes = LogHeader::default().encode();
        assert!(matches!(
            LogHeader::decode(&bytes[..43]),
            Err(LogError::TruncatedInput {
                needed: 44,
                available: 43
            })
        ));
    }

    #[test]
    fn decode_bad_magic_fails() {
        let mut bytes = LogHeader::default().encode();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            LogHeader::decode(&bytes),
            Err(LogError::BadMagic { .. })
        ));
    }

    #[test]
    fn decode_future_version_fails() {
        let mut bytes = LogHeader::default().encode();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            LogHeader::decode(&bytes),
            Err(LogError::UnsupportedVersion { version: 2, max: 1 })
        ));
    }

    #[test]
    fn decode_unknown_compression_fails() {
        let mut bytes = LogHeader::default().encode();
        bytes[10] = 42;
        assert!(matches!(
            LogHeader::decode(&bytes),
            Err(LogError::UnknownCompression(42))
        ));
    }
}
