//! In-memory byte stream.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A blob log stream held entirely in memory.
///
/// Suitable for unit tests and for building a blob file in memory before
/// handing its bytes to another component.
///
/// # Example
///
/// ```rust
/// use blobdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"record").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 6);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream over pre-existing bytes.
    ///
    /// Useful for replaying a damaged file image.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the stream contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Applies `f` to the raw bytes in place.
    ///
    /// Lets tests damage a file image without rebuilding the backend.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<u8>),
    {
        f(&mut self.data.write());
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_append_returns_committed_offset() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"header").unwrap(), 0);
        assert_eq!(backend.append(b"record").unwrap(), 6);
        assert_eq!(backend.size().unwrap(), 12);
    }

    #[test]
    fn memory_read_at_returns_appended_bytes() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"key|blob").unwrap();

        assert_eq!(backend.read_at(0, 3).unwrap(), b"key");
        assert_eq!(backend.read_at(4, 4).unwrap(), b"blob");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"short").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_zero_length_read_at_end() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();
        assert!(backend.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn memory_modify_in_place() {
        let backend = InMemoryBackend::with_data(vec![0u8; 4]);
        backend.modify(|bytes| bytes[2] ^= 0xFF);
        assert_eq!(backend.data(), vec![0, 0, 0xFF, 0]);
    }

    #[test]
    fn memory_truncate_tail() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"complete|torn").unwrap();

        backend.truncate(8).unwrap();
        assert_eq!(backend.data(), b"complete");

        let result = backend.truncate(100);
        assert!(matches!(result, Err(StorageError::InvalidTruncate { .. })));
    }
}
