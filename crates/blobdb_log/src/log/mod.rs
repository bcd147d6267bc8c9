//! Writing and reading block-framed blob log files.

mod framer;
mod reader;
mod writer;

pub use framer::{
    BlockFramer, Frame, FragmentAssembler, FramedRecord, FRAME_HEADER_SIZE, MIN_FRAGMENT_SIZE,
};
pub use reader::{BlobLogReader, CorruptionEvent, LogEntry, ReadRecord, ReaderState, RecoveryReport};
pub use writer::{BlobLogWriter, FooterSummary};
