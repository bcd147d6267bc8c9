//! Inspect command implementation.

use super::open_file;
use blobdb_log::{BlobLogReader, LogConfig, LogFooter, LogHeader};
use blobdb_storage::StorageBackend;
use serde::Serialize;
use std::path::Path;

/// Blob file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Format version from the header.
    pub version: u32,
    /// Compression tag from the header.
    pub compression: String,
    /// TTL hint written at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_guess: Option<(u64, u64)>,
    /// Timestamp hint written at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_guess: Option<(u64, u64)>,
    /// Whether a valid footer was found.
    pub sealed: bool,
    /// Footer contents, for sealed files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<FooterInfo>,
}

/// Footer fields.
#[derive(Debug, Serialize)]
pub struct FooterInfo {
    /// Number of records.
    pub record_count: u64,
    /// Sequence number range.
    pub sequence_range: (u64, u64),
    /// Exact TTL range, if any record has a TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_range: Option<(u64, u64)>,
    /// Exact timestamp range, if any record has a timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_range: Option<(u64, u64)>,
}

impl From<&LogFooter> for FooterInfo {
    fn from(footer: &LogFooter) -> Self {
        Self {
            record_count: footer.record_count(),
            sequence_range: footer.sequence_range(),
            ttl_range: footer.ttl().map(|r| r.as_pair()),
            timestamp_range: footer.timestamp().map(|r| r.as_pair()),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, block_size: u32, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, block_size)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Reads header and footer metadata without scanning records.
pub fn inspect(path: &Path, block_size: u32) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let backend = open_file(path)?;
    // Best effort so that a damaged footer still lets the header be shown.
    let config = LogConfig::default().block_size(block_size).best_effort();
    let reader = BlobLogReader::open(&backend, &config)?;
    let header: &LogHeader = reader.header();

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: backend.size()?,
        version: header.version(),
        compression: header.compression().to_string(),
        ttl_guess: header.ttl_guess().map(|r| r.as_pair()),
        timestamp_guess: header.timestamp_guess().map(|r| r.as_pair()),
        sealed: reader.is_sealed(),
        footer: reader.footer().map(FooterInfo::from),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("BlobDB Blob File");
    println!("================");
    println!();
    println!("Path:        {}", result.path);
    println!("Size:        {}", format_size(result.file_size));
    println!("Version:     {}", result.version);
    println!("Compression: {}", result.compression);
    if let Some((lo, hi)) = result.ttl_guess {
        println!("TTL hint:    [{}, {}]", lo, hi);
    }
    if let Some((lo, hi)) = result.timestamp_guess {
        println!("Time hint:   [{}, {}]", lo, hi);
    }
    println!();

    match &result.footer {
        Some(footer) => {
            println!("Footer:");
            println!("  Records:    {}", footer.record_count);
            println!(
                "  Sequences:  [{}, {}]",
                footer.sequence_range.0, footer.sequence_range.1
            );
            if let Some((lo, hi)) = footer.ttl_range {
                println!("  TTL:        [{}, {}]", lo, hi);
            }
            if let Some((lo, hi)) = footer.timestamp_range {
                println!("  Timestamps: [{}, {}]", lo, hi);
            }
        }
        None => println!("Footer: none (file not sealed)"),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
