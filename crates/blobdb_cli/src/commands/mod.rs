//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use blobdb_storage::FileBackend;
use std::path::Path;

/// Opens a blob file without write access.
pub(crate) fn open_file(path: &Path) -> Result<FileBackend, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No blob file found at {}", path.display()).into());
    }
    Ok(FileBackend::open_read_only(path)?)
}

/// Hex-encodes a short byte string, or prints it as text when it is printable ASCII.
pub(crate) fn display_key(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
