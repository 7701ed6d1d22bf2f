//! Log Module
//!
//! The commit log that coordinates all segments.
//!
//! ## Responsibilities
//! - Rebuild the segment list from the directory on startup
//! - Route appends to the active segment, reads to the owning segment
//! - Roll over to a new segment when the active one is full
//! - Drop fully consumed segments (truncation)
//! - Export every store as one byte stream (snapshots, replication)

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LogError, Result};
use crate::record::Record;
use crate::storage::{Segment, Store, STORE_EXTENSION};

/// Segmented, append-only commit log
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (append/truncate/close/...): exclusive side of `segments`
/// - **Reads** (read): shared side of `segments`; each store serializes its
///   own flush-then-read behind an internal mutex
///
/// The last segment in `segments` is always the active one.
pub struct Log {
    /// Directory holding every segment's files
    dir: PathBuf,

    /// Log configuration (defaults already applied)
    config: Config,

    /// Segments ordered by ascending base offset
    segments: RwLock<Vec<Segment>>,
}

impl Log {
    /// Open or create a log in `dir`
    ///
    /// On startup:
    /// 1. Replace unset thresholds with defaults
    /// 2. Create the directory if it doesn't exist
    /// 3. Reopen a segment for every `.store` file, oldest first
    /// 4. Create an empty segment at `initial_offset` if there were none
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let config = config.with_defaults();
        let segments = Self::load_segments(&dir, &config)?;

        info!(
            dir = %dir.display(),
            segments = segments.len(),
            "Opened log"
        );

        Ok(Self {
            dir,
            config,
            segments: RwLock::new(segments),
        })
    }

    /// Append a record, returning its absolute offset
    ///
    /// Rolls over to a new segment at `offset + 1` once the active segment
    /// is maxed out.
    pub fn append(&self, record: Record) -> Result<u64> {
        let mut segments = self.segments.write();

        // A maxed segment can be active after reopening with smaller limits
        let active = Self::active(&segments)?;
        if active.is_maxed() && active.next_offset() > active.base_offset() {
            let next = active.next_offset();
            self.roll_over(&mut segments, next)?;
        }

        let offset = Self::active_mut(&mut segments)?.append(record)?;

        if Self::active(&segments)?.is_maxed() {
            self.roll_over(&mut segments, offset + 1)?;
        }

        Ok(offset)
    }

    /// Read the record at `offset`
    pub fn read(&self, offset: u64) -> Result<Record> {
        let segments = self.segments.read();

        let idx = segments.partition_point(|s| s.next_offset() <= offset);
        match segments.get(idx) {
            Some(segment) if segment.contains(offset) => segment.read(offset),
            _ => Err(LogError::OffsetOutOfRange { offset }),
        }
    }

    /// Flush and close every segment, keeping the files
    pub fn close(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_segments(&mut segments)
    }

    /// Close the log and delete its directory
    pub fn remove(&self) -> Result<()> {
        let mut segments = self.segments.write();
        self.remove_locked(&mut segments)
    }

    /// Remove the log, then start over with a fresh segment at `initial_offset`
    pub fn reset(&self) -> Result<()> {
        let mut segments = self.segments.write();
        self.remove_locked(&mut segments)?;
        *segments = Self::load_segments(&self.dir, &self.config)?;

        info!(dir = %self.dir.display(), "Reset log");
        Ok(())
    }

    /// Base offset of the oldest retained segment
    pub fn lowest_offset(&self) -> Result<u64> {
        let segments = self.segments.write();
        segments
            .first()
            .map(Segment::base_offset)
            .ok_or(LogError::Closed)
    }

    /// Last assigned offset, or 0 when nothing was ever assigned
    pub fn highest_offset(&self) -> Result<u64> {
        let segments = self.segments.write();
        Ok(Self::active(&segments)?.next_offset().saturating_sub(1))
    }

    /// Delete every segment whose records all sit at or below `lowest`
    ///
    /// If that drops every segment, a fresh one starts at `lowest + 1`.
    pub fn truncate(&self, lowest: u64) -> Result<()> {
        let mut segments = self.segments.write();
        let boundary = lowest.saturating_add(1);

        let count = segments.partition_point(|s| s.next_offset() <= boundary);
        for _ in 0..count {
            let segment = segments.remove(0);
            let base_offset = segment.base_offset();
            segment.remove()?;
            debug!(base_offset, "Removed segment");
        }

        if segments.is_empty() {
            segments.push(Segment::open(&self.dir, boundary, self.config.segment)?);
        }

        info!(lowest, removed = count, remaining = segments.len(), "Truncated log");
        Ok(())
    }

    /// Stream every segment's raw store bytes, oldest segment first
    ///
    /// The stream is in store frame format; see [`crate::storage::frames`].
    pub fn reader(&self) -> LogReader {
        let segments = self.segments.write();
        let readers = segments
            .iter()
            .map(|s| StoreReader {
                store: s.store(),
                position: 0,
            })
            .collect();

        LogReader {
            readers,
            current: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the log directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Discover and open segments in `dir`, oldest first
    fn load_segments(dir: &Path, config: &Config) -> Result<Vec<Segment>> {
        fs::create_dir_all(dir)?;

        let mut base_offsets: Vec<u64> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match Self::parse_base_offset(&path) {
                Some(base_offset) => base_offsets.push(base_offset),
                None if Self::is_segment_file(&path) => {
                    warn!(path = %path.display(), "Skipping segment file with invalid name");
                }
                None => {}
            }
        }

        base_offsets.sort_unstable();
        base_offsets.dedup();

        let mut segments = Vec::with_capacity(base_offsets.len().max(1));
        for base_offset in base_offsets {
            segments.push(Segment::open(dir, base_offset, config.segment)?);
        }

        if segments.is_empty() {
            segments.push(Segment::open(dir, config.segment.initial_offset, config.segment)?);
        }

        Ok(segments)
    }

    /// Base offset from a store file name; index files are ignored so each
    /// segment counts once
    /// "42.store" → Some(42)
    fn parse_base_offset(path: &Path) -> Option<u64> {
        if path.extension()? != STORE_EXTENSION {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }

    fn is_segment_file(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == STORE_EXTENSION)
    }

    fn active(segments: &[Segment]) -> Result<&Segment> {
        segments.last().ok_or(LogError::Closed)
    }

    fn active_mut(segments: &mut [Segment]) -> Result<&mut Segment> {
        segments.last_mut().ok_or(LogError::Closed)
    }

    /// Start a new active segment at `base_offset`
    fn roll_over(&self, segments: &mut Vec<Segment>, base_offset: u64) -> Result<()> {
        let segment = Segment::open(&self.dir, base_offset, self.config.segment)?;
        segments.push(segment);

        info!(base_offset, segments = segments.len(), "Rolled over to new segment");
        Ok(())
    }

    /// Close each segment once, keeping every failure
    fn close_segments(segments: &mut [Segment]) -> Result<()> {
        let mut errors = Vec::new();
        for segment in segments.iter_mut() {
            if let Err(e) = segment.close() {
                warn!(base_offset = segment.base_offset(), error = %e, "Failed to close segment");
                errors.push(e);
            }
        }
        LogError::collect(errors)
    }

    fn remove_locked(&self, segments: &mut [Segment]) -> Result<()> {
        Self::close_segments(segments)?;
        fs::remove_dir_all(&self.dir)?;
        Ok(())
    }
}

// =============================================================================
// Export Stream
// =============================================================================

/// Sequential reader over the raw bytes of every segment's store
///
/// Holds shared handles to the stores, not the log lock; appends made after
/// the reader was created may or may not be included for the last segment.
pub struct LogReader {
    readers: Vec<StoreReader>,
    current: usize,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(reader) = self.readers.get_mut(self.current) {
            let n = reader.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.current += 1;
        }

        Ok(0)
    }
}

/// Reads one store from position 0 to its end
struct StoreReader {
    store: Arc<Store>,
    position: u64,
}

impl Read for StoreReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.store.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}
