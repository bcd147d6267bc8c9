//! On-disk layout of a blob log file.
//!
//! ```text
//! | header (44) | block 0 | block 1 | ... | block n (partial) | footer (64) |
//! ```
//!
//! Blocks start right after the header. Each block holds framed record
//! fragments and possibly zero padding at its tail; see
//! [`crate::log::BlockFramer`].
//!
//! All integers are little-endian. Checksums are CRC-32 (IEEE).
//!
//! ## Header
//!
//! ```text
//! | magic (4) | version (4) | flags (4) | ttl_lo (8) | ttl_hi (8) | ts_lo (8) | ts_hi (8) |
//! ```
//!
//! ## Footer
//!
//! ```text
//! | magic (4) | flags (4) | count (8) | ttl_lo (8) | ttl_hi (8) | sn_lo (8) | sn_hi (8) | ts_lo (8) | ts_hi (8) |
//! ```
//!
//! `flags` byte 0 is `1` when a TTL range is present, byte 1 is `2` when a
//! timestamp range is present. In the header, byte 2 is the compression
//! tag. Absent ranges are stored as zeros.
//!
//! ## Record
//!
//! ```text
//! | header_crc (4) | payload_crc (4) | key_size (4) | blob_size (8) | ttl (8) | timestamp (8) | type (1) | subtype (1) | reserved (4) |
//! | key (key_size) | blob (blob_size) | sequence (8) | trailer_crc (4) |
//! ```

mod footer;
mod header;
mod record;

pub use footer::{LogFooter, FOOTER_MAGIC};
pub use header::{LogHeader, FORMAT_VERSION, HEADER_MAGIC};
pub use record::{
    decode_trailer, encode_record, encode_trailer, BlobRecord, RecordHeader, RecordSubtype,
    RecordType, NO_TIMESTAMP, NO_TTL, RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE,
};

use crate::error::{LogError, LogResult};
use crate::types::ValueRange;

/// Flags byte marking a present TTL range.
const TTL_PRESENT: u8 = RecordSubtype::Ttl as u8;

/// Flags byte marking a present timestamp range.
const TIMESTAMP_PRESENT: u8 = RecordSubtype::Timestamp as u8;

/// Computes the CRC-32 checksum used throughout the format.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Presence bits shared by header and footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RangeFlags {
    pub has_ttl: bool,
    pub has_timestamp: bool,
    /// Byte 2 of the flags word; the header stores compression here.
    pub extra: u8,
}

impl RangeFlags {
    pub(crate) fn encode(self) -> u32 {
        let ttl = if self.has_ttl { TTL_PRESENT } else { 0 };
        let ts = if self.has_timestamp { TIMESTAMP_PRESENT } else { 0 };
        u32::from_le_bytes([ttl, ts, self.extra, 0])
    }

    pub(crate) fn decode(flags: u32) -> LogResult<Self> {
        let [ttl, ts, extra, reserved] = flags.to_le_bytes();
        let has_ttl = match ttl {
            0 => false,
            TTL_PRESENT => true,
            _ => return Err(LogError::InvalidFlags { flags }),
        };
        let has_timestamp = match ts {
            0 => false,
            TIMESTAMP_PRESENT => true,
            _ => return Err(LogError::InvalidFlags { flags }),
        };
        if reserved != 0 {
            return Err(LogError::InvalidFlags { flags });
        }
        Ok(Self {
            has_ttl,
            has_timestamp,
            extra,
        })
    }
}

/// Little-endian writer over a fixed buffer.
pub(crate) struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
    }

    pub(crate) fn put_u64(&mut self, v: u64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&v.to_le_bytes());
        self.pos += 8;
    }

    /// Writes a range, or zeros when absent.
    pub(crate) fn put_range(&mut self, range: Option<ValueRange>) {
        let range = range.unwrap_or_default();
        self.put_u64(range.low);
        self.put_u64(range.high);
    }
}

/// Little-endian reader over a slice whose length the caller has checked.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    pub(crate) fn u32(&mut self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(raw)
    }

    pub(crate) fn u64(&mut self) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        u64::from_le_bytes(raw)
    }

    pub(crate) fn range(&mut self) -> ValueRange {
        let low = self.u64();
        let high = self.u64();
        ValueRange::new(low, high)
    }
}
