//! Blob record encoding and validation.

use super::{checksum, ByteReader, ByteWriter};
use crate::error::{LogError, LogResult};
use crate::types::SequenceNumber;

/// Stored TTL value meaning "no TTL".
pub const NO_TTL: u64 = u64::MAX;

/// Stored timestamp value meaning "no timestamp".
pub const NO_TIMESTAMP: u64 = u64::MAX;

/// Record header size:
/// header crc (4) + payload crc (4) + key size (4) + blob size (8) +
/// ttl (8) + timestamp (8) + type (1) + subtype (1) + reserved (4) = 42 bytes.
pub const RECORD_HEADER_SIZE: usize = 4 + 4 + 4 + 8 + 8 + 8 + 1 + 1 + 4;

/// Record trailer size: sequence (8) + trailer crc (4).
pub const RECORD_TRAILER_SIZE: usize = 8 + 4;

/// Bytes covered by the header checksum start here.
const HEADER_CHECKSUM_START: usize = 8;

/// Fragment class of a record or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A complete record.
    Full = 0,
    /// Opening fragment of a record split across blocks.
    First = 1,
    /// Interior fragment.
    Middle = 2,
    /// Closing fragment.
    Last = 3,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Full),
            1 => Some(Self::First),
            2 => Some(Self::Middle),
            3 => Some(Self::Last),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// What optional metadata a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordSubtype {
    /// Neither TTL nor timestamp.
    Regular = 0,
    /// A TTL, possibly along with a timestamp.
    Ttl = 1,
    /// A timestamp and no TTL.
    Timestamp = 2,
}

impl RecordSubtype {
    /// Converts a byte to a subtype.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Regular),
            1 => Some(Self::Ttl),
            2 => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Converts the subtype to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    fn classify(ttl: Option<u64>, timestamp: Option<u64>) -> Self {
        if ttl.is_some_and(|t| t != NO_TTL) {
            Self::Ttl
        } else if timestamp.is_some_and(|t| t != NO_TIMESTAMP) {
            Self::Timestamp
        } else {
            Self::Regular
        }
    }
}

/// One key and its out-of-line value.
///
/// A TTL or timestamp equal to `u64::MAX` is the on-disk "absent" marker
/// and reads back as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Blob bytes.
    pub blob: Vec<u8>,
    /// Expiration, if any.
    pub ttl: Option<u64>,
    /// Write timestamp, if any.
    pub timestamp: Option<u64>,
    /// Engine sequence number of the write.
    pub sequence: SequenceNumber,
}

impl BlobRecord {
    /// Creates a record with no TTL and no timestamp.
    pub fn new(key: impl Into<Vec<u8>>, blob: impl Into<Vec<u8>>, sequence: SequenceNumber) -> Self {
        Self {
            key: key.into(),
            blob: blob.into(),
            ttl: None,
            timestamp: None,
            sequence,
        }
    }

    /// Sets the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns whether the record expires.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.ttl.is_some_and(|t| t != NO_TTL)
    }

    /// Subtype tag the record is written with.
    #[must_use]
    pub fn subtype(&self) -> RecordSubtype {
        RecordSubtype::classify(self.ttl, self.timestamp)
    }

    /// Length of the encoded record before framing.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE) as u64 + self.key.len() as u64 + self.blob.len() as u64
    }

    /// Encodes the record. See [`encode_record`].
    ///
    /// # Errors
    ///
    /// Returns [`LogError::RecordTooLarge`] if the key does not fit a 4-byte length.
    pub fn encode(&self) -> LogResult<Vec<u8>> {
        encode_record(&self.key, &self.blob, self.ttl, self.timestamp, self.sequence)
    }

    /// Decodes and validates a complete encoded record.
    ///
    /// # Errors
    ///
    /// Any error of [`RecordHeader::decode`], [`RecordHeader::decode_payload`]
    /// or [`decode_trailer`], or [`LogError::RecordLengthMismatch`] if
    /// `bytes` is longer or shorter than the header declares.
    pub fn decode(bytes: &[u8]) -> LogResult<Self> {
        let header = RecordHeader::decode(bytes)?;

        let expected = header.record_len();
        if bytes.len() as u64 != expected {
            return Err(LogError::RecordLengthMismatch {
                expected,
                actual: bytes.len() as u64,
            });
        }

        let payload_end = bytes.len() - RECORD_TRAILER_SIZE;
        let (key, blob) = header.decode_payload(&bytes[RECORD_HEADER_SIZE..payload_end])?;
        let sequence = decode_trailer(&bytes[payload_end..])?;

        Ok(Self {
            key,
            blob,
            ttl: header.ttl(),
            timestamp: header.timestamp(),
            sequence,
        })
    }
}

/// Encodes a record: header, key, blob and sequence trailer.
///
/// The header checksum covers the fixed fields after the two checksums;
/// the payload checksum covers `key ‖ blob`. The type is always
/// [`RecordType::Full`]; splitting across blocks is recorded by the frames.
///
/// # Errors
///
/// Returns [`LogError::RecordTooLarge`] if the key does not fit a 4-byte length.
pub fn encode_record(
    key: &[u8],
    blob: &[u8],
    ttl: Option<u64>,
    timestamp: Option<u64>,
    sequence: SequenceNumber,
) -> LogResult<Vec<u8>> {
    let key_size = u32::try_from(key.len()).map_err(|_| LogError::RecordTooLarge {
        what: "key",
        size: key.len() as u64,
        limit: u64::from(u32::MAX),
    })?;

    let mut header = [0u8; RECORD_HEADER_SIZE];
    {
        let mut w = ByteWriter::new(&mut header[HEADER_CHECKSUM_START..]);
        w.put_u32(key_size);
        w.put_u64(blob.len() as u64);
        w.put_u64(ttl.unwrap_or(NO_TTL));
        w.put_u64(timestamp.unwrap_or(NO_TIMESTAMP));
        w.put_u8(RecordType::Full.as_byte());
        w.put_u8(RecordSubtype::classify(ttl, timestamp).as_byte());
        w.put_u32(0);
    }

    let header_crc = checksum(&header[HEADER_CHECKSUM_START..]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(blob);
    let payload_crc = hasher.finalize();

    {
        let mut w = ByteWriter::new(&mut header[..HEADER_CHECKSUM_START]);
        w.put_u32(header_crc);
        w.put_u32(payload_crc);
    }

    let mut buf =
        Vec::with_capacity(RECORD_HEADER_SIZE + key.len() + blob.len() + RECORD_TRAILER_SIZE);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(key);
    buf.extend_from_slice(blob);
    buf.extend_from_slice(&encode_trailer(sequence));
    Ok(buf)
}

/// Encodes the sequence-number trailer.
#[must_use]
pub fn encode_trailer(sequence: SequenceNumber) -> [u8; RECORD_TRAILER_SIZE] {
    let mut buf = [0u8; RECORD_TRAILER_SIZE];
    let seq = sequence.as_u64().to_le_bytes();
    let crc = checksum(&seq);
    let mut w = ByteWriter::new(&mut buf);
    w.put_u64(sequence.as_u64());
    w.put_u32(crc);
    buf
}

/// Decodes and validates the sequence-number trailer.
///
/// # Errors
///
/// Returns [`LogError::TruncatedInput`] if `bytes` is shorter than the
/// trailer, or [`LogError::TrailerChecksumMismatch`].
pub fn decode_trailer(bytes: &[u8]) -> LogResult<SequenceNumber> {
    if bytes.len() < RECORD_TRAILER_SIZE {
        return Err(LogError::truncated(RECORD_TRAILER_SIZE, bytes.len()));
    }
    let mut r = ByteReader::new(bytes);
    let sequence = r.u64();
    let stored = r.u32();
    let computed = checksum(&bytes[..8]);
    if stored != computed {
        return Err(LogError::TrailerChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }
    Ok(SequenceNumber::new(sequence))
}

/// The fixed 42-byte portion of a record, checksum-verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Stored header checksum.
    pub header_checksum: u32,
    /// Stored payload checksum.
    pub payload_checksum: u32,
    /// Key length.
    pub key_size: u32,
    /// Blob length.
    pub blob_size: u64,
    /// Raw TTL field ([`NO_TTL`] when absent).
    pub ttl: u64,
    /// Raw timestamp field ([`NO_TIMESTAMP`] when absent).
    pub timestamp: u64,
    /// Record type.
    pub record_type: RecordType,
    /// Record subtype.
    pub subtype: RecordSubtype,
}

impl RecordHeader {
    /// Decodes the fixed header from the start of `bytes`.
    ///
    /// The header checksum is verified before any length field is
    /// interpreted, so a damaged size never drives an allocation.
    ///
    /// # Errors
    ///
    /// - [`LogError::TruncatedInput`] if fewer than 42 bytes are given
    /// - [`LogError::HeaderChecksumMismatch`] if the checksum fails
    /// - [`LogError::UnknownRecordType`] / [`LogError::UnknownSubtype`]
    pub fn decode(bytes: &[u8]) -> LogResult<Self> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(LogError::truncated(RECORD_HEADER_SIZE, bytes.len()));
        }
        let header = &bytes[..RECORD_HEADER_SIZE];
        let mut r = ByteReader::new(header);

        let header_checksum = r.u32();
        let payload_checksum = r.u32();
        let computed = checksum(&header[HEADER_CHECKSUM_START..]);
        if header_checksum != computed {
            return Err(LogError::HeaderChecksumMismatch {
                expected: header_checksum,
                actual: computed,
            });
        }

        let key_size = r.u32();
        let blob_size = r.u64();
        let ttl = r.u64();
        let timestamp = r.u64();
        let type_byte = r.u8();
        let subtype_byte = r.u8();
        let _reserved = r.u32();

        let record_type =
            RecordType::from_byte(type_byte).ok_or(LogError::UnknownRecordType(type_byte))?;
        let subtype =
            RecordSubtype::from_byte(subtype_byte).ok_or(LogError::UnknownSubtype(subtype_byte))?;

        Ok(Self {
            header_checksum,
            payload_checksum,
            key_size,
            blob_size,
            ttl,
            timestamp,
            record_type,
            subtype,
        })
    }

    /// Returns whether the record carries a TTL.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.ttl != NO_TTL
    }

    /// TTL, if present.
    #[must_use]
    pub fn ttl(&self) -> Option<u64> {
        self.has_ttl().then_some(self.ttl)
    }

    /// Timestamp, if present.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        (self.timestamp != NO_TIMESTAMP).then_some(self.timestamp)
    }

    /// Length of `key ‖ blob`.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        u64::from(self.key_size).saturating_add(self.blob_size)
    }

    /// Length of the whole encoded record.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        self.payload_len()
            .saturating_add((RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE) as u64)
    }

    /// Splits and verifies `key ‖ blob`.
    ///
    /// # Errors
    ///
    /// - [`LogError::TruncatedInput`] if `bytes` is shorter than `key_size + blob_size`
    /// - [`LogError::RecordLengthMismatch`] if it is longer
    /// - [`LogError::PayloadChecksumMismatch`] if the checksum fails
    pub fn decode_payload(&self, bytes: &[u8]) -> LogResult<(Vec<u8>, Vec<u8>)> {
        let expected = self.payload_len();
        let actual = bytes.len() as u64;
        if actual < expected {
            return Err(LogError::TruncatedInput {
                needed: expected,
                available: actual,
            });
        }
        if actual > expected {
            return Err(LogError::RecordLengthMismatch { expected, actual });
        }

        let computed = checksum(bytes);
        if computed != self.payload_checksum {
            return Err(LogError::PayloadChecksumMismatch {
                expected: self.payload_checksum,
                actual: computed,
            });
        }

        let (key, blob) = bytes.split_at(self.key_size as usize);
        Ok((key.to_vec(), blob.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlobRecord {
        BlobRecord::new(b"user:42".to_vec(), b"a large value".to_vec(), SequenceNumber::new(77))
            .with_ttl(1_700_000_000)
            .with_timestamp(1_600_000_000)
    }

    #[test]
    fn header_size_is_42() {
        assert_eq!(RECORD_HEADER_SIZE, 42);
    }

    #[test]
    fn record_roundtrip() {
        let record = sample();
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len() as u64, record.encoded_len());
        assert_eq!(BlobRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn header_then_payload_decode() {
        let record = sample();
        let bytes = record.encode().unwrap();

        let header = RecordHeader::decode(&bytes).unwrap();
        assert_eq!(header.key_size, 7);
        assert_eq!(header.blob_size, 13);
        assert_eq!(header.record_type, RecordType::Full);
        assert_eq!(header.subtype, RecordSubtype::Ttl);
        assert_eq!(header.ttl(), Some(1_700_000_000));
        assert_eq!(header.timestamp(), Some(1_600_000_000));

        let end = RECORD_HEADER_SIZE + header.payload_len() as usize;
        let (key, blob) = header.decode_payload(&bytes[RECORD_HEADER_SIZE..end]).unwrap();
        assert_eq!(key, b"user:42");
        assert_eq!(blob, b"a large value");
        assert_eq!(decode_trailer(&bytes[end..]).unwrap(), SequenceNumber::new(77));
    }

    #[test]
    fn absent_metadata_uses_sentinels() {
        let record = BlobRecord::new(b"k".to_vec(), b"v".to_vec(), SequenceNumber::new(1));
        let bytes = record.encode().unwrap();
        let header = RecordHeader::decode(&bytes).unwrap();
        assert_eq!(header.ttl, NO_TTL);
        assert_eq!(header.timestamp, NO_TIMESTAMP);
        assert!(!header.has_ttl());
        assert_eq!(header.subtype, RecordSubtype::Regular);

        let decoded = BlobRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.ttl, None);
        assert_eq!(decoded.timestamp, None);
    }

    #[test]
    fn timestamp_only_subtype() {
        let record = BlobRecord::new(b"k".to_vec(), Vec::new(), SequenceNumber::new(3))
            .with_timestamp(0);
        assert_eq!(record.subtype(), RecordSubtype::Timestamp);
        let decoded = BlobRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.timestamp, Some(0));
        assert!(decoded.blob.is_empty());
    }

    #[test]
    fn every_header_bit_flip_is_detected() {
        let bytes = sample().encode().unwrap();
        for byte in 0..RECORD_HEADER_SIZE {
            if (4..8).contains(&byte) {
                // Payload checksum field is not covered by the header checksum.
                continue;
            }
            for bit in 0..8 {
                let mut damaged = bytes.clone();
                damaged[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        RecordHeader::decode(&damaged),
                        Err(LogError::HeaderChecksumMismatch { .. })
                    ),
                    "flip at byte {byte} bit {bit} not detected"
                );
            }
        }
    }

    #[test]
    fn payload_checksum_field_flip_is_detected() {
        let bytes = sample().encode().unwrap();
        let mut damaged = bytes.clone();
        damaged[5] ^= 0x10;
        assert!(matches!(
            BlobRecord::decode(&damaged),
            Err(LogError::PayloadChecksumMismatch { .. })
        ));
    }

    #[test]
    fn every_payload_bit_flip_is_detected() {
        let record = sample();
        let bytes = record.encode().unwrap();
        let payload_end = RECORD_HEADER_SIZE + record.key.len() + record.blob.len();
        for byte in RECORD_HEADER_SIZE..payload_end {
            for bit in 0..8 {
                let mut damaged = bytes.clone();
                damaged[byte] ^= 1 << bit;
                assert!(matches!(
                    BlobRecord::decode(&damaged),
                    Err(LogError::PayloadChecksumMismatch { .. })
                ));
            }
        }
    }

    #[test]
    fn trailer_flip_is_detected() {
        let bytes = sample().encode().unwrap();
        let mut damaged = bytes.clone();
        let last = damaged.len() - 6;
        damaged[last] ^= 0x01;
        assert!(matches!(
            BlobRecord::decode(&damaged),
            Err(LogError::TrailerChecksumMismatch { .. })
        ));
    }

    #[test]
    fn decode_payload_requires_exact_length() {
        let record = sample();
        let bytes = record.encode().unwrap();
        let header = RecordHeader::decode(&bytes).unwrap();
        let payload = &bytes[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + 20];

        assert!(matches!(
            header.decode_payload(&payload[..19]),
            Err(LogError::TruncatedInput { needed: 20, available: 19 })
        ));

        let mut longer = payload.to_vec();
        longer.push(0);
        assert!(matches!(
            header.decode_payload(&longer),
            Err(LogError::RecordLengthMismatch { expected: 20, actual: 21 })
        ));
    }

    #[test]
    fn decode_short_header_fails() {
        let bytes = sample().encode().unwrap();
        assert!(matches!(
            RecordHeader::decode(&bytes[..41]),
            Err(LogError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn trailing_garbage_is_a_length_mismatch() {
        let mut bytes = sample().encode().unwrap();
        bytes.push(0xAB);
        assert!(matches!(
            BlobRecord::decode(&bytes),
            Err(LogError::RecordLengthMismatch { .. })
        ));
    }
}
