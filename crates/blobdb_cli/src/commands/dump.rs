//! Dump command implementation.

use super::{display_key, open_file};
use blobdb_log::{BlobLogReader, LogConfig, LogEntry, ReadRecord};
use serde::Serialize;
use std::path::Path;

/// One dumped entry.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DumpEntry {
    /// A valid record.
    Record(RecordInfo),
    /// A damaged region skipped by a best-effort scan.
    Corruption {
        /// Offset of the damage.
        offset: u64,
        /// Error description.
        error: String,
    },
}

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the record's first frame.
    pub offset: u64,
    /// Bytes spanned by the record's frames.
    pub length: u64,
    /// Sequence number.
    pub sequence: u64,
    /// Key, as text when printable, otherwise hex.
    pub key: String,
    /// Blob size in bytes.
    pub blob_size: usize,
    /// Record subtype.
    pub subtype: String,
    /// TTL, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Timestamp, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl From<&ReadRecord> for RecordInfo {
    fn from(read: &ReadRecord) -> Self {
        let record = &read.record;
        Self {
            offset: read.location.offset,
            length: read.location.length,
            sequence: record.sequence.as_u64(),
            key: display_key(&record.key),
            blob_size: record.blob.len(),
            subtype: format!("{:?}", record.subtype()),
            ttl: record.ttl,
            timestamp: record.timestamp,
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    block_size: u32,
    limit: Option<usize>,
    best_effort: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = collect(path, block_size, limit, best_effort)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&entries);
        }
    }

    Ok(())
}

/// Scans up to `limit` records.
///
/// In strict mode the first corruption ends the dump with an error.
pub fn collect(
    path: &Path,
    block_size: u32,
    limit: Option<usize>,
    best_effort: bool,
) -> Result<Vec<DumpEntry>, Box<dyn std::error::Error>> {
    let backend = open_file(path)?;
    let mut config = LogConfig::default().block_size(block_size);
    if best_effort {
        config = config.best_effort();
    }

    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = 0;
    let mut entries = Vec::new();

    for entry in BlobLogReader::open(&backend, &config)? {
        if records >= max_records {
            break;
        }
        match entry? {
            LogEntry::Record(read) => {
                records += 1;
                entries.push(DumpEntry::Record(RecordInfo::from(&read)));
            }
            LogEntry::Corruption(event) => entries.push(DumpEntry::Corruption {
                offset: event.offset,
                error: event.error.to_string(),
            }),
        }
    }

    Ok(entries)
}

fn print_text_output(entries: &[DumpEntry]) {
    let records = entries
        .iter()
        .filter(|e| matches!(e, DumpEntry::Record(_)))
        .count();
    println!("Blob Records ({} total)", records);
    println!("================");
    println!();

    for entry in entries {
        match entry {
            DumpEntry::Record(record) => {
                print!(
                    "[{:08}] seq={} key={} blob={}B",
                    record.offset, record.sequence, record.key, record.blob_size
                );
                if let Some(ttl) = record.ttl {
                    print!(" ttl={}", ttl);
                }
                if let Some(ts) = record.timestamp {
                    print!(" ts={}", ts);
                }
                println!();
            }
            DumpEntry::Corruption { offset, error } => {
                println!("[{:08}] CORRUPT {}", offset, error);
            }
        }
    }
}
