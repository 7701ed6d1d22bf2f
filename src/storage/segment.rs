//! Segment
//!
//! Binds one store and one index under a shared base offset.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SegmentConfig;
use crate::error::{LogError, Result};
use crate::record::Record;

use super::index::Index;
use super::store::{Store, LEN_WIDTH};

/// Extension of segment store files
pub const STORE_EXTENSION: &str = "store";

/// Extension of segment index files
pub const INDEX_EXTENSION: &str = "index";

/// A bounded, offset-contiguous slice of the log
///
/// Owns absolute offsets `[base_offset, next_offset)`.
pub struct Segment {
    store: Arc<Store>,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: SegmentConfig,
    store_path: PathBuf,
    index_path: PathBuf,
}

impl Segment {
    /// Open or create the segment with the given base offset in `dir`
    ///
    /// On open:
    /// 1. Open/create `<base>.store` (append mode) and `<base>.index`
    /// 2. Drop index entries left dangling by an unclean shutdown
    /// 3. Recover `next_offset` from the last index entry
    pub fn open(dir: &Path, base_offset: u64, config: SegmentConfig) -> Result<Self> {
        let store_path = Self::path_with_dir(dir, base_offset, STORE_EXTENSION);
        let index_path = Self::path_with_dir(dir, base_offset, INDEX_EXTENSION);

        let store_file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&store_path)?;
        let store = Store::open(store_file)?;

        let index_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&index_path)?;
        let index = Index::open(index_file, &config)?;

        let mut segment = Self {
            store: Arc::new(store),
            index,
            base_offset,
            next_offset: base_offset,
            config,
            store_path,
            index_path,
        };
        segment.reconcile()?;

        segment.next_offset = match segment.index.last() {
            Ok(entry) => base_offset + entry.relative_offset as u64 + 1,
            Err(LogError::EndOfData) => base_offset,
            Err(e) => return Err(e),
        };

        debug!(
            base_offset,
            next_offset = segment.next_offset,
            store_size = segment.store.size(),
            "Opened segment"
        );

        Ok(segment)
    }

    /// Append a record, returning the absolute offset assigned to it
    ///
    /// Nothing is written and `next_offset` is unchanged when any step fails.
    pub fn append(&mut self, mut record: Record) -> Result<u64> {
        let offset = self.next_offset;
        self.index.check_room()?;

        record.offset = offset;
        let payload = record.encode()?;

        let (_, position) = self.store.append(&payload)?;
        self.index.write((offset - self.base_offset) as u32, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Read the record at absolute `offset`
    pub fn read(&self, offset: u64) -> Result<Record> {
        let relative = offset
            .checked_sub(self.base_offset)
            .and_then(|r| u32::try_from(r).ok())
            .ok_or(LogError::EndOfData)?;

        let entry = self.index.read(relative)?;
        let payload = self.store.read(entry.position)?;
        Record::decode(&payload)
    }

    /// True once either file reached its configured threshold
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes
            || self.index.size() >= self.config.max_index_bytes
    }

    /// Whether `offset` falls inside `[base_offset, next_offset)`
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    /// Close both files; each is attempted even if the other fails
    pub fn close(&mut self) -> Result<()> {
        let mut errors = Vec::new();
        if let Err(e) = self.index.close() {
            errors.push(e);
        }
        if let Err(e) = self.store.close() {
            errors.push(e);
        }
        LogError::collect(errors)
    }

    /// Close and delete both files
    pub fn remove(mut self) -> Result<()> {
        self.close()?;
        fs::remove_file(&self.index_path)?;
        fs::remove_file(&self.store_path)?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Logical store size in bytes
    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Shared handle to the store, for raw export
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Segment file path given a directory, base offset and extension
    /// 16, "store" → "{dir}/16.store"
    pub(crate) fn path_with_dir(dir: &Path, base_offset: u64, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", base_offset, extension))
    }

    /// Repair the segment after an unclean shutdown
    ///
    /// An index that was never closed is still at full capacity (zero
    /// padded), and buffered store bytes may never have reached the file.
    /// Trailing entries are dropped until the last one sits in its own slot
    /// and points at a frame that is fully on disk. The store is then cut
    /// back to the end of that frame so the next append starts on a frame
    /// boundary.
    ///
    /// A store with an empty index file keeps its bytes.
    fn reconcile(&mut self) -> Result<()> {
        let indexed = self.index.len();
        if indexed == 0 {
            return Ok(());
        }

        let mut entries = indexed;
        let mut store_end = 0;
        while entries > 0 {
            let slot = entries - 1;
            let entry = self.index.read(slot as u32)?;
            if entry.relative_offset as u64 == slot {
                if let Some(len) = self.store.frame_len(entry.position)? {
                    store_end = entry.position + LEN_WIDTH + len;
                    break;
                }
            }
            entries -= 1;
        }

        if entries < indexed {
            warn!(
                base_offset = self.base_offset,
                dropped = indexed - entries,
                "Dropping index entries past the last complete frame"
            );
            self.index.truncate_entries(entries);
        }

        let store_size = self.store.size();
        if store_end < store_size {
            warn!(
                base_offset = self.base_offset,
                store_size,
                store_end,
                "Cutting store bytes past the last indexed frame"
            );
            self.store.truncate(store_end)?;
        }

        Ok(())
    }
}
