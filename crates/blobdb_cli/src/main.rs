//! BlobDB CLI
//!
//! Command-line tools for BlobDB blob files.
//!
//! # Commands
//!
//! - `inspect` - Display header and footer metadata
//! - `dump` - Print the records of a blob file
//! - `verify` - Scan a blob file and report damaged regions

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BlobDB command-line blob file tools.
#[derive(Parser)]
#[command(name = "blobdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the blob file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Block size the file was written with
    #[arg(global = true, short, long, default_value_t = blobdb_log::DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display header and footer metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the records of a blob file
    Dump {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip damaged regions instead of stopping at the first one
        #[arg(long)]
        best_effort: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Scan a blob file and report damaged regions
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Blob file path required for inspect")?;
            commands::inspect::run(&path, cli.block_size, &format)?;
        }
        Commands::Dump {
            limit,
            best_effort,
            format,
        } => {
            let path = cli.path.ok_or("Blob file path required for dump")?;
            commands::dump::run(&path, cli.block_size, limit, best_effort, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or("Blob file path required for verify")?;
            commands::verify::run(&path, cli.block_size, &format)?;
        }
        Commands::Version => {
            println!("BlobDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("BlobDB Log v{}", blobdb_log::VERSION);
            println!("Blob format version {}", blobdb_log::FORMAT_VERSION);
        }
    }

    Ok(())
}
