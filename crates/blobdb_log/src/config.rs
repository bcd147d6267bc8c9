//! Blob log configuration.

use crate::error::{LogError, LogResult};
use crate::types::{CompressionType, ValueRange};

/// Default block size: 32 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 32 * 1024;

/// Smallest accepted block size.
pub const MIN_BLOCK_SIZE: u32 = 64;

/// Largest accepted block size.
pub const MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// How a reader reacts to a damaged record or frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Surface the first corruption as an error and stop.
    #[default]
    Strict,
    /// Report the corruption, skip to the next block boundary and continue.
    BestEffort,
}

/// Configuration shared by blob log writers and readers.
///
/// The block size is part of the on-disk contract: a file must be read
/// with the block size it was written with.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Size of a framing block in bytes.
    pub block_size: u32,

    /// Compression tag recorded in the header of new files.
    pub compression: CompressionType,

    /// Reader behavior on corruption.
    pub recovery_mode: RecoveryMode,

    /// Whether to flush the stream after every append.
    pub sync_on_append: bool,

    /// Whether to sync the stream after the footer is written.
    pub sync_on_close: bool,

    /// TTL range hint written to the header of new files.
    pub ttl_guess: Option<ValueRange>,

    /// Timestamp range hint written to the header of new files.
    pub timestamp_guess: Option<ValueRange>,

    /// Largest key accepted by the writer.
    pub max_key_size: u32,

    /// Largest blob accepted by the writer.
    pub max_blob_size: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression: CompressionType::None,
            recovery_mode: RecoveryMode::Strict,
            sync_on_append: false,
            sync_on_close: true,
            ttl_guess: None,
            timestamp_guess: None,
            max_key_size: u32::MAX,
            max_blob_size: u64::MAX / 2,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size.
    #[must_use]
    pub const fn block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the compression tag for new files.
    #[must_use]
    pub const fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the reader recovery mode.
    #[must_use]
    pub const fn recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Shorthand for [`RecoveryMode::BestEffort`].
    #[must_use]
    pub const fn best_effort(self) -> Self {
        self.recovery_mode(RecoveryMode::BestEffort)
    }

    /// Sets whether to flush after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets whether to sync after the footer is written.
    #[must_use]
    pub const fn sync_on_close(mut self, value: bool) -> Self {
        self.sync_on_close = value;
        self
    }

    /// Sets the header TTL hint.
    #[must_use]
    pub const fn ttl_guess(mut self, range: ValueRange) -> Self {
        self.ttl_guess = Some(range);
        self
    }

    /// Sets the header timestamp hint.
    #[must_use]
    pub const fn timestamp_guess(mut self, range: ValueRange) -> Self {
        self.timestamp_guess = Some(range);
        self
    }

    /// Sets the largest accepted key.
    #[must_use]
    pub const fn max_key_size(mut self, size: u32) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets the largest accepted blob.
    #[must_use]
    pub const fn max_blob_size(mut self, size: u64) -> Self {
        self.max_blob_size = size;
        self
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidConfig`] if the block size is out of
    /// range or a header hint has `low > high`.
    pub fn validate(&self) -> LogResult<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(LogError::invalid_config(format!(
                "block size {} outside {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}",
                self.block_size
            )));
        }
        for (name, hint) in [("ttl", self.ttl_guess), ("timestamp", self.timestamp_guess)] {
            if let Some(range) = hint {
                if !range.is_valid() {
                    return Err(LogError::invalid_config(format!(
                        "{name} hint {range} has low > high"
                    )));
                }
            }
        }
        Ok(())
    }
}
