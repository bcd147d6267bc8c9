//! Blob log file footer.

use std::fmt;

use super::{ByteReader, ByteWriter, RangeFlags};
use crate::error::{LogError, LogResult};
use crate::types::{SequenceNumber, ValueRange};

/// Magic number opening the footer of a sealed blob log file.
pub const FOOTER_MAGIC: u32 = 0x0024_8F38;

/// Exact aggregates written once when a blob log file is sealed.
///
/// Only the writer in this crate updates the aggregates; everyone else
/// reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFooter {
    record_count: u64,
    ttl_range: Option<ValueRange>,
    sequence_range: Option<ValueRange>,
    timestamp_range: Option<ValueRange>,
}

impl LogFooter {
    /// Encoded size: magic + flags + count + three ranges.
    pub const SIZE: usize = 4 + 4 + 8 + 8 * 2 + 8 * 2 + 8 * 2;

    /// Folds one appended record into the aggregates.
    pub(crate) fn observe(
        &mut self,
        ttl: Option<u64>,
        timestamp: Option<u64>,
        sequence: SequenceNumber,
    ) {
        self.record_count += 1;
        if let Some(ttl) = ttl {
            self.ttl_range = Some(extend(self.ttl_range, ttl));
        }
        if let Some(ts) = timestamp {
            self.timestamp_range = Some(extend(self.timestamp_range, ts));
        }
        self.sequence_range = Some(extend(self.sequence_range, sequence.as_u64()));
    }

    /// Number of records in the file.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Returns whether any record carried a TTL.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.ttl_range.is_some()
    }

    /// Returns whether any record carried a timestamp.
    #[must_use]
    pub fn has_timestamp(&self) -> bool {
        self.timestamp_range.is_some()
    }

    /// Exact TTL range, if any record carried a TTL.
    #[must_use]
    pub fn ttl(&self) -> Option<ValueRange> {
        self.ttl_range
    }

    /// Exact timestamp range, if any record carried a timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Option<ValueRange> {
        self.timestamp_range
    }

    /// TTL bounds, `(0, 0)` when absent.
    #[must_use]
    pub fn ttl_range(&self) -> (u64, u64) {
        self.ttl_range.unwrap_or_default().as_pair()
    }

    /// Timestamp bounds, `(0, 0)` when absent.
    #[must_use]
    pub fn timestamp_range(&self) -> (u64, u64) {
        self.timestamp_range.unwrap_or_default().as_pair()
    }

    /// Sequence-number bounds, `(0, 0)` for an empty file.
    #[must_use]
    pub fn sequence_range(&self) -> (u64, u64) {
        self.sequence_range.unwrap_or_default().as_pair()
    }

    /// Encodes the footer to its fixed 64-byte form.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        let mut w = ByteWriter::new(&mut buf);
        w.put_u32(FOOTER_MAGIC);
        w.put_u32(
            RangeFlags {
                has_ttl: self.has_ttl(),
                has_timestamp: self.has_timestamp(),
                extra: 0,
            }
            .encode(),
        );
        w.put_u64(self.record_count);
        w.put_range(self.ttl_range);
        w.put_range(self.sequence_range);
        w.put_range(self.timestamp_range);
        buf
    }

    /// Decodes a footer from the first 64 bytes of `input`.
    ///
    /// # Errors
    ///
    /// - [`LogError::TruncatedInput`] if fewer than 64 bytes are given
    /// - [`LogError::BadMagic`] if the magic number is wrong
    /// - [`LogError::InvalidFlags`] for unknown flag bytes
    /// - [`LogError::InvalidRange`] if a present range has `low > high`
    pub fn decode(input: &[u8]) -> LogResult<Self> {
        if input.len() < Self::SIZE {
            return Err(LogError::truncated(Self::SIZE, input.len()));
        }
        let mut r = ByteReader::new(&input[..Self::SIZE]);

        let magic = r.u32();
        if magic != FOOTER_MAGIC {
            return Err(LogError::BadMagic {
                expected: FOOTER_MAGIC,
                actual: magic,
            });
        }

        let raw_flags = r.u32();
        let flags = RangeFlags::decode(raw_flags)?;
        if flags.extra != 0 {
            return Err(LogError::InvalidFlags { flags: raw_flags });
        }

        let record_count = r.u64();
        let ttl = r.range();
        let sequence = r.range();
        let ts = r.range();

        // Absent ranges are ignored, whatever bytes they hold.
        Ok(Self {
            record_count,
            ttl_range: present("ttl", flags.has_ttl, ttl)?,
            sequence_range: present("sequence", record_count > 0, sequence)?,
            timestamp_range: present("timestamp", flags.has_timestamp, ts)?,
        })
    }
}

fn extend(range: Option<ValueRange>, value: u64) -> ValueRange {
    match range {
        Some(r) => r.extend(value),
        None => ValueRange::point(value),
    }
}

fn present(field: &'static str, is_present: bool, range: ValueRange) -> LogResult<Option<ValueRange>> {
    if !is_present {
        return Ok(None);
    }
    if !range.is_valid() {
        return Err(LogError::InvalidRange {
            field,
            low: range.low,
            high: range.high,
        });
    }
    Ok(Some(range))
}

impl fmt::Display for LogFooter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(range: Option<ValueRange>) -> String {
            range.map_or_else(|| "-".to_string(), |r| r.to_string())
        }
        write!(
            f,
            "records={} sequence={} ttl={} timestamp={}",
            self.record_count,
            opt(self.sequence_range),
            opt(self.ttl_range),
            opt(self.timestamp_range)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_size_is_64() {
        assert_eq!(LogFooter::SIZE, 64);
    }

    #[test]
    fn observe_tracks_exact_ranges() {
        let mut footer = LogFooter::default();
        footer.observe(Some(300), None, SequenceNumber::new(5));
        footer.observe(None, Some(10), SequenceNumber::new(7));
        footer.observe(Some(100), Some(40), SequenceNumber::new(9));
        footer.observe(None, None, SequenceNumber::new(12));

        assert_eq!(footer.record_count(), 4);
        assert_eq!(footer.sequence_range(), (5, 12));
        assert_eq!(footer.ttl_range(), (100, 300));
        assert_eq!(footer.timestamp_range(), (10, 40));

        let decoded = LogFooter::decode(&footer.encode()).unwrap();
        assert_eq!(decoded, footer);
    }

    #[test]
    fn empty_footer_has_absent_ranges() {
        let decoded = LogFooter::decode(&LogFooter::default().encode()).unwrap();
        assert_eq!(decoded.record_count(), 0);
        assert!(!decoded.has_ttl());
        assert!(!decoded.has_timestamp());
        assert_eq!(decoded.ttl_range(), (0, 0));
        assert_eq!(decoded.timestamp_range(), (0, 0));
        assert_eq!(decoded.sequence_range(), (0, 0));
    }

    #[test]
    fn footer_layout() {
        let mut footer = LogFooter::default();
        footer.observe(None, Some(3), SequenceNumber::new(8));
        let bytes = footer.encode();
        assert_eq!(&bytes[0..4], &FOOTER_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0, 2, 0, 0]);
        assert_eq!(&bytes[8..16], &1u64.to_le_bytes());
        assert_eq!(&bytes[16..32], &[0u8; 16]);
        assert_eq!(&bytes[32..40], &8u64.to_le_bytes());
        assert_eq!(&bytes[40..48], &8u64.to_le_bytes());
        assert_eq!(&bytes[48..56], &3u64.to_le_bytes());
    }

    #[test]
    fn header_magic_is_not_a_footer() {
        let bytes = crate::format::LogHeader::default().encode();
        let mut padded = bytes.to_vec();
        padded.resize(LogFooter::SIZE, 0);
        assert!(matches!(
            LogFooter::decode(&padded),
            Err(LogError::BadMagic { .. })
        ));
    }

    #[test]
    fn decode_inverted_range_fails() {
        let mut footer = LogFooter::default();
        footer.observe(Some(1), None, SequenceNumber::new(1));
        let mut bytes = footer.encode();
        // ttl_lo = 9 > ttl_hi = 1
        bytes[16..24].copy_from_slice(&9u64.to_le_bytes());
        assert!(matches!(
            LogFooter::decode(&bytes),
            Err(LogError::InvalidRange { field: "ttl", low: 9, high: 1 })
        ));
    }

    #[test]
    fn absent_ranges_are_not_validated() {
        let mut footer = LogFooter::default();
        footer.observe(None, None, SequenceNumber::new(4));
        let mut bytes = footer.encode();
        // Inverted leftovers in the ttl and timestamp slots.
        bytes[16..24].copy_from_slice(&9u64.to_le_bytes());
        bytes[48..56].copy_from_slice(&u64::MAX.to_le_bytes());
        bytes[56..64].copy_from_slice(&1u64.to_le_bytes());

        let decoded = LogFooter::decode(&bytes).unwrap();
        assert_eq!(decoded, footer);
        assert_eq!(decoded.ttl(), None);
        assert_eq!(decoded.timestamp(), None);
        assert_eq!(decoded.sequence_range(), (4, 4));
    }

    #[test]
    fn decode_truncated_fails() {
        let bytes = LogFooter::default().encode();
        assert!(matches!(
            LogFooter::decode(&bytes[..10]),
            Err(LogError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn display_is_readable() {
        let mut footer = LogFooter::default();
        footer.observe(Some(60), None, SequenceNumber::new(2));
        assert_eq!(
            footer.to_string(),
            "records=1 sequence=[2, 2] ttl=[60, 60] timestamp=-"
        );
    }
}
