//! seglog CLI
//!
//! Operator tool for inspecting and editing a log directory.

use clap::{Parser, Subcommand};
use seglog::storage::frames;
use seglog::{Config, Log, Record};
use tracing_subscriber::{fmt, EnvFilter};

/// seglog CLI
#[derive(Parser, Debug)]
#[command(name = "seglog")]
#[command(about = "Inspect and edit a segmented commit log")]
#[command(version)]
struct Args {
    /// Log directory
    #[arg(short, long, default_value = "./seglog_data")]
    dir: String,

    /// Store size (bytes) at which a segment rolls over
    #[arg(long, default_value = "1024")]
    max_store_bytes: u64,

    /// Index size (bytes) at which a segment rolls over
    #[arg(long, default_value = "1024")]
    max_index_bytes: u64,

    /// First offset of a brand-new log
    #[arg(long, default_value = "0")]
    initial_offset: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one record per value
    Append {
        /// Values to append
        values: Vec<String>,
    },

    /// Read the record at an offset
    Read {
        /// Absolute offset
        offset: u64,
    },

    /// Show segment count and offset range
    Info,

    /// Print every record from the export stream
    Dump,

    /// Drop segments whose records are all at or below an offset
    Truncate {
        /// Highest offset that may be discarded
        lowest: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seglog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .max_store_bytes(args.max_store_bytes)
        .max_index_bytes(args.max_index_bytes)
        .initial_offset(args.initial_offset)
        .build();

    let log = match Log::open(&args.dir, config) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!("Failed to open log: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&log, args.command);
    let closed = log.close();

    if let Err(e) = outcome.and(closed) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(log: &Log, command: Commands) -> seglog::Result<()> {
    match command {
        Commands::Append { values } => {
            for value in values {
                let offset = log.append(Record::new(value))?;
                println!("{}", offset);
            }
        }
        Commands::Read { offset } => {
            let record = log.read(offset)?;
            println!("{}\t{}", record.offset, String::from_utf8_lossy(&record.value));
        }
        Commands::Info => {
            println!("dir:      {}", log.dir().display());
            println!("segments: {}", log.segment_count());
            println!("lowest:   {}", log.lowest_offset()?);
            println!("highest:  {}", log.highest_offset()?);
        }
        Commands::Dump => {
            for frame in frames(log.reader()) {
                let record = Record::decode(&frame?)?;
                println!("{}\t{}", record.offset, String::from_utf8_lossy(&record.value));
            }
        }
        Commands::Truncate { lowest } => {
            log.truncate(lowest)?;
            println!("lowest offset now {}", log.lowest_offset()?);
        }
    }
    Ok(())
}
