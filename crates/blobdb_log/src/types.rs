//! Core type definitions for the blob log.

use std::fmt;

/// Sequence number assigned by the key-value engine to each write.
///
/// Higher sequence numbers are more recent. Within one blob file they are
/// non-decreasing in append order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// An inclusive `[low, high]` range of 64-bit values.
///
/// Used for TTL, timestamp and sequence-number bounds in headers and
/// footers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ValueRange {
    /// Inclusive lower bound.
    pub low: u64,
    /// Inclusive upper bound.
    pub high: u64,
}

impl ValueRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Creates a range holding a single value.
    #[must_use]
    pub const fn point(value: u64) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    /// Returns the smallest range covering `self` and `value`.
    #[must_use]
    pub fn extend(self, value: u64) -> Self {
        Self {
            low: self.low.min(value),
            high: self.high.max(value),
        }
    }

    /// Returns whether `low <= high`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.low <= self.high
    }

    /// Returns the bounds as a pair.
    #[must_use]
    pub const fn as_pair(&self) -> (u64, u64) {
        (self.low, self.high)
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// Compression codec used for blobs in a file.
///
/// The log only records the tag; compressing and decompressing blobs is
/// the engine's business.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionType {
    /// Blobs are stored as given.
    #[default]
    None = 0,
    /// Snappy.
    Snappy = 1,
    /// Zlib.
    Zlib = 2,
    /// BZip2.
    Bzip2 = 3,
    /// LZ4.
    Lz4 = 4,
    /// LZ4 high compression.
    Lz4hc = 5,
    /// Xpress.
    Xpress = 6,
    /// Zstandard.
    Zstd = 7,
}

impl CompressionType {
    /// Converts a tag byte to a compression type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Snappy),
            2 => Some(Self::Zlib),
            3 => Some(Self::Bzip2),
            4 => Some(Self::Lz4),
            5 => Some(Self::Lz4hc),
            6 => Some(Self::Xpress),
            7 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Converts the compression type to its tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns a lowercase name for display.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
            Self::Zlib => "zlib",
            Self::Bzip2 => "bzip2",
            Self::Lz4 => "lz4",
            Self::Lz4hc => "lz4hc",
            Self::Xpress => "xpress",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a record lives in a blob file.
///
/// The engine keeps this in its key → location index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordLocation {
    /// File offset of the record's first fragment frame.
    pub offset: u64,
    /// Bytes spanned from `offset` to the end of the record's last fragment.
    pub length: u64,
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_ordering() {
        assert!(SequenceNumber::new(5) < SequenceNumber::new(7));
        assert_eq!(format!("{}", SequenceNumber::new(12)), "seq:12");
    }

    #[test]
    fn range_extend_covers_values() {
        let range = ValueRange::point(7).extend(5).extend(12).extend(9);
        assert_eq!(range.as_pair(), (5, 12));
        assert!(range.is_valid());
        assert!(!ValueRange::new(3, 1).is_valid());
    }

    #[test]
    fn compression_tags_are_stable() {
        for b in 0..=7u8 {
            let c = CompressionType::from_byte(b).unwrap();
            assert_eq!(c.as_byte(), b);
        }
        assert_eq!(CompressionType::from_byte(8), None);
        assert_eq!(CompressionType::Zstd.to_string(), "zstd");
    }
}
