//! Block framing of encoded records.
//!
//! The record region of a file is cut into fixed-size blocks. An encoded
//! record is written as one or more fragments, each confined to a single
//! block and prefixed by a frame:
//!
//! ```text
//! | type (1) | length (4) | payload (length) |
//! ```
//!
//! `type` is [`RecordType::Full`] for a record that fits in the space left
//! in its block, otherwise `First`, zero or more `Middle`, then `Last`.
//! When fewer than [`MIN_FRAGMENT_SIZE`] bytes remain in a block, the
//! writer fills them with zeros and continues in the next block. An
//! all-zero frame reads as padding, so preallocated (zeroed) space is
//! skipped the same way.

use crate::error::{LogError, LogResult};
use crate::format::RecordType;

/// Frame size: type (1) + payload length (4).
pub const FRAME_HEADER_SIZE: usize = 1 + 4;

/// Smallest fragment worth starting: a frame plus one payload byte.
pub const MIN_FRAGMENT_SIZE: usize = FRAME_HEADER_SIZE + 1;

/// Outcome of framing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedRecord {
    /// Zero bytes emitted before the first frame.
    pub padding: usize,
    /// Number of fragments the record was split into.
    pub fragments: usize,
}

/// Splits encoded records into block-confined fragments.
///
/// Tracks the write position inside the current block across records.
#[derive(Debug, Clone)]
pub struct BlockFramer {
    block_size: usize,
    block_offset: usize,
}

impl BlockFramer {
    /// Creates a framer positioned at the start of a block.
    #[must_use]
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size: block_size as usize,
            block_offset: 0,
        }
    }

    /// Position inside the current block.
    #[must_use]
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// Appends the frames for `record` to `out`.
    ///
    /// `record` must not be empty.
    pub fn frame(&mut self, record: &[u8], out: &mut Vec<u8>) -> FramedRecord {
        debug_assert!(!record.is_empty(), "cannot frame an empty record");

        let mut padding = 0;
        let mut fragments = 0;
        let mut remaining = record;

        loop {
            let left = self.block_size - self.block_offset;
            if left < MIN_FRAGMENT_SIZE {
                if fragments == 0 {
                    padding += left;
                }
                out.resize(out.len() + left, 0);
                self.block_offset = 0;
                continue;
            }

            let take = remaining.len().min(left - FRAME_HEADER_SIZE);
            let is_last = take == remaining.len();
            let record_type = match (fragments == 0, is_last) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, false) => RecordType::Middle,
                (false, true) => RecordType::Last,
            };

            out.push(record_type.as_byte());
            // take <= block_size <= 16 MiB
            out.extend_from_slice(&(take as u32).to_le_bytes());
            out.extend_from_slice(&remaining[..take]);

            self.block_offset += FRAME_HEADER_SIZE + take;
            if self.block_offset == self.block_size {
                self.block_offset = 0;
            }
            remaining = &remaining[take..];
            fragments += 1;

            if is_last {
                break;
            }
        }

        FramedRecord { padding, fragments }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Zero bytes: the rest of the block carries nothing.
    Padding,
    /// A record fragment of `len` payload bytes.
    Fragment {
        /// Fragment class.
        record_type: RecordType,
        /// Payload length.
        len: u32,
    },
}

impl Frame {
    /// Parses a frame from the first [`FRAME_HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TruncatedInput`] for short input, or
    /// [`LogError::FragmentSequence`] for an unknown type or a zero-length
    /// fragment that is not padding.
    pub fn parse(bytes: &[u8]) -> LogResult<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(LogError::truncated(FRAME_HEADER_SIZE, bytes.len()));
        }
        let type_byte = bytes[0];
        let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);

        if type_byte == 0 && len == 0 {
            return Ok(Self::Padding);
        }
        let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
            LogError::fragment_sequence(format!("unknown fragment type {type_byte}"))
        })?;
        if len == 0 {
            return Err(LogError::fragment_sequence(format!(
                "zero-length {record_type:?} fragment"
            )));
        }
        Ok(Self::Fragment { record_type, len })
    }
}

/// Reassembles fragments into encoded records.
///
/// A record completes on a `Full` fragment, or on `First`, any number of
/// `Middle`, then `Last`. Any other order is a framing error; the partial
/// record is dropped when that happens.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    buffer: Vec<u8>,
    start: Option<u64>,
}

impl FragmentAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File offset of the first fragment of a record in progress.
    #[must_use]
    pub fn pending_offset(&self) -> Option<u64> {
        self.start
    }

    /// Bytes gathered so far for the record in progress.
    #[must_use]
    pub fn pending_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Drops any record in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.start = None;
    }

    /// Feeds one fragment found at file offset `offset`.
    ///
    /// Returns the record's starting offset and bytes once complete.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::FragmentSequence`] for an out-of-order or empty
    /// fragment. The assembler is reset before returning.
    pub fn push(
        &mut self,
        offset: u64,
        record_type: RecordType,
        payload: &[u8],
    ) -> LogResult<Option<(u64, Vec<u8>)>> {
        if payload.is_empty() {
            self.reset();
            return Err(LogError::fragment_sequence(format!(
                "zero-length {record_type:?} fragment"
            )));
        }

        match (record_type, self.start) {
            (RecordType::Full, None) => Ok(Some((offset, payload.to_vec()))),
            (RecordType::First, None) => {
                self.start = Some(offset);
                self.buffer.extend_from_slice(payload);
                Ok(None)
            }
            (RecordType::Middle, Some(_)) => {
                self.buffer.extend_from_slice(payload);
                Ok(None)
            }
            (RecordType::Last, Some(start)) => {
                self.buffer.extend_from_slice(payload);
                let bytes = std::mem::take(&mut self.buffer);
                self.start = None;
                Ok(Some((start, bytes)))
            }
            (RecordType::Full | RecordType::First, Some(start)) => {
                self.reset();
                Err(LogError::fragment_sequence(format!(
                    "{record_type:?} fragment at {offset} while record from {start} is incomplete"
                )))
            }
            (RecordType::Middle | RecordType::Last, None) => Err(LogError::fragment_sequence(
                format!("{record_type:?} fragment at {offset} without a First fragment"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits framed output back into (type, payload) pairs, skipping padding.
    fn unframe(bytes: &[u8], block_size: usize, mut block_offset: usize) -> Vec<(RecordType, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let left = block_size - block_offset;
            if left < MIN_FRAGMENT_SIZE {
                pos += left;
                block_offset = 0;
                continue;
            }
            match Frame::parse(&bytes[pos..]).unwrap() {
                Frame::Padding => panic!("unexpected padding frame"),
                Frame::Fragment { record_type, len } => {
                    let len = len as usize;
                    out.push((record_type, bytes[pos + 5..pos + 5 + len].to_vec()));
                    pos += 5 + len;
                    block_offset = (block_offset + 5 + len) % block_size;
                }
            }
        }
        out
    }

    #[test]
    fn small_record_is_one_full_fragment() {
        let mut framer = BlockFramer::new(64);
        let mut out = Vec::new();
        let framed = framer.frame(&[7u8; 20], &mut out);

        assert_eq!(framed, FramedRecord { padding: 0, fragments: 1 });
        assert_eq!(out.len(), 25);
        assert_eq!(out[0], RecordType::Full.as_byte());
        assert_eq!(&out[1..5], &20u32.to_le_bytes());
        assert_eq!(framer.block_offset(), 25);
    }

    #[test]
    fn large_record_splits_first_middle_last() {
        let record: Vec<u8> = (0..200u8).collect();
        let mut framer = BlockFramer::new(64);
        let mut out = Vec::new();
        let framed = framer.frame(&record, &mut out);

        // 59 + 59 + 59 + 23 payload bytes
        assert_eq!(framed.fragments, 4);
        let pieces = unframe(&out, 64, 0);
        let types: Vec<_> = pieces.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            types,
            vec![RecordType::First, RecordType::Middle, RecordType::Middle, RecordType::Last]
        );
        let joined: Vec<u8> = pieces.into_iter().flat_map(|(_, p)| p).collect();
        assert_eq!(joined, record);
        assert_eq!(framer.block_offset(), 28);
    }

    #[test]
    fn short_block_tail_is_padded() {
        let mut framer = BlockFramer::new(64);
        let mut out = Vec::new();
        // 5 + 55 = 60 bytes, leaving 4 < MIN_FRAGMENT_SIZE
        framer.frame(&[1u8; 55], &mut out);
        assert_eq!(framer.block_offset(), 60);

        let framed = framer.frame(&[2u8; 10], &mut out);
        assert_eq!(framed.padding, 4);
        assert_eq!(&out[60..64], &[0u8; 4]);
        assert_eq!(out[64], RecordType::Full.as_byte());
        assert_eq!(framer.block_offset(), 15);
    }

    #[test]
    fn record_filling_block_exactly_resets_offset() {
        let mut framer = BlockFramer::new(64);
        let mut out = Vec::new();
        framer.frame(&[3u8; 59], &mut out);
        assert_eq!(out.len(), 64);
        assert_eq!(framer.block_offset(), 0);
    }

    #[test]
    fn tail_of_exactly_min_fragment_is_used() {
        let mut framer = BlockFramer::new(64);
        let mut out = Vec::new();
        framer.frame(&[1u8; 53], &mut out); // 58 used, 6 left
        let framed = framer.frame(&[2u8; 3], &mut out);
        assert_eq!(framed.padding, 0);
        assert_eq!(framed.fragments, 2);
        assert_eq!(out[58], RecordType::First.as_byte());
        assert_eq!(&out[59..63], &1u32.to_le_bytes());
    }

    #[test]
    fn parse_frames() {
        assert_eq!(Frame::parse(&[0, 0, 0, 0, 0]).unwrap(), Frame::Padding);
        assert_eq!(
            Frame::parse(&[3, 9, 0, 0, 0]).unwrap(),
            Frame::Fragment { record_type: RecordType::Last, len: 9 }
        );
        assert!(matches!(
            Frame::parse(&[9, 1, 0, 0, 0]),
            Err(LogError::FragmentSequence { .. })
        ));
        assert!(matches!(
            Frame::parse(&[2, 0, 0, 0, 0]),
            Err(LogError::FragmentSequence { .. })
        ));
        assert!(matches!(
            Frame::parse(&[1, 0]),
            Err(LogError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn assembler_full_fragment() {
        let mut asm = FragmentAssembler::new();
        let done = asm.push(100, RecordType::Full, b"abc").unwrap();
        assert_eq!(done, Some((100, b"abc".to_vec())));
        assert_eq!(asm.pending_offset(), None);
    }

    #[test]
    fn assembler_first_middle_last() {
        let mut asm = FragmentAssembler::new();
        assert_eq!(asm.push(10, RecordType::First, b"ab").unwrap(), None);
        assert_eq!(asm.pending_offset(), Some(10));
        assert_eq!(asm.pending_bytes(), b"ab");
        assert_eq!(asm.push(74, RecordType::Middle, b"cd").unwrap(), None);
        let done = asm.push(138, RecordType::Last, b"ef").unwrap();
        assert_eq!(done, Some((10, b"abcdef".to_vec())));
        assert_eq!(asm.pending_offset(), None);
    }

    #[test]
    fn assembler_rejects_orphan_middle_and_last() {
        let mut asm = FragmentAssembler::new();
        assert!(asm.push(0, RecordType::Middle, b"x").is_err());
        assert!(asm.push(0, RecordType::Last, b"x").is_err());
    }

    #[test]
    fn assembler_rejects_restart_and_drops_partial() {
        let mut asm = FragmentAssembler::new();
        asm.push(0, RecordType::First, b"a").unwrap();
        assert!(matches!(
            asm.push(64, RecordType::First, b"b"),
            Err(LogError::FragmentSequence { .. })
        ));
        assert_eq!(asm.pending_offset(), None);

        asm.push(128, RecordType::First, b"c").unwrap();
        assert!(asm.push(192, RecordType::Full, b"d").is_err());
        assert_eq!(asm.pending_offset(), None);
    }

    #[test]
    fn assembler_rejects_empty_fragment() {
        let mut asm = FragmentAssembler::new();
        asm.push(0, RecordType::First, b"a").unwrap();
        assert!(asm.push(64, RecordType::Middle, b"").is_err());
        assert_eq!(asm.pending_offset(), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn framing_is_transparent(
                block_size in 64u32..512,
                records in prop::collection::vec(
                    prop::collection::vec(any::<u8>(), 1..1500),
                    1..12,
                ),
            ) {
                let mut framer = BlockFramer::new(block_size);
                let mut out = Vec::new();
                for record in &records {
                    framer.frame(record, &mut out);
                }

                let mut asm = FragmentAssembler::new();
                let mut rebuilt = Vec::new();
                let mut offset = 0u64;
                for (record_type, payload) in unframe(&out, block_size as usize, 0) {
                    if let Some((_, bytes)) = asm.push(offset, record_type, &payload).unwrap() {
                        rebuilt.push(bytes);
                    }
                    offset += 1;
                }

                prop_assert_eq!(rebuilt, records);
                prop_assert_eq!(asm.pending_offset(), None);
                prop_assert_eq!(framer.block_offset(), out.len() % block_size as usize);
            }
        }
    }
}
