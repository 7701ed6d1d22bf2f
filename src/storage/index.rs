//! Index
//!
//! Fixed-width offset → store position entries in a memory-mapped file.
//!
//! ## Entry Format
//! ```text
//! ┌────────────────────────────┬──────────────────────────────┐
//! │ Relative Offset: u32 BE (4)│ Store Position: u64 BE (8)   │
//! └────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! The file is grown to its full capacity while open and shrunk back to the
//! logical size on close, so the length of a cleanly closed file is always
//! a whole number of entries.

use std::fs::File;

use bytes::{Buf, BufMut};
use memmap2::MmapMut;

use crate::config::SegmentConfig;
use crate::error::{LogError, Result};

/// Width of the relative offset field
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the store position field
pub const POSITION_WIDTH: u64 = 8;

/// Total width of one entry
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// A single decoded index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset relative to the segment's base offset
    pub relative_offset: u32,
    /// Byte position of the frame in the store
    pub position: u64,
}

/// Memory-mapped offset index
///
/// Performs no locking of its own: writes only happen while the owning log
/// holds its write lock, and `size` only grows under that lock.
pub struct Index {
    /// `None` once closed, together with `mmap`
    file: Option<File>,
    /// `None` once closed
    mmap: Option<MmapMut>,
    /// Bytes of meaningful entries
    size: u64,
}

impl Index {
    /// Open an index over `file`, growing and mapping it to capacity
    pub fn open(file: File, config: &SegmentConfig) -> Result<Self> {
        let len = file.metadata()?.len();
        let size = len - len % ENTRY_WIDTH;

        // Never shrink below existing entries when the threshold was lowered
        let capacity = config.max_index_bytes.max(len);
        file.set_len(capacity)?;

        // SAFETY: the file is owned by this index for as long as the map lives
        // and a log directory is owned by a single process.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file: Some(file),
            mmap: Some(mmap),
            size,
        })
    }

    /// Append an entry; `EndOfData` when the mapped capacity is exhausted
    pub fn write(&mut self, relative_offset: u32, position: u64) -> Result<()> {
        self.check_room()?;
        let start = self.size as usize;
        let mmap = self.mmap.as_mut().ok_or(LogError::Closed)?;

        let mut slot = &mut mmap[start..start + ENTRY_WIDTH as usize];
        slot.put_u32(relative_offset);
        slot.put_u64(position);

        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Entry at slot `n`
    pub fn read(&self, n: u32) -> Result<IndexEntry> {
        let mmap = self.mmap.as_ref().ok_or(LogError::Closed)?;
        if self.size == 0 {
            return Err(LogError::EndOfData);
        }

        let start = n as u64 * ENTRY_WIDTH;
        if self.size < start + ENTRY_WIDTH {
            return Err(LogError::EndOfData);
        }

        let mut slot = &mmap[start as usize..(start + ENTRY_WIDTH) as usize];
        Ok(IndexEntry {
            relative_offset: slot.get_u32(),
            position: slot.get_u64(),
        })
    }

    /// Last written entry
    pub fn last(&self) -> Result<IndexEntry> {
        match self.len() {
            0 => Err(LogError::EndOfData),
            n => self.read((n - 1) as u32),
        }
    }

    /// `Closed` once closed, `EndOfData` when one more entry does not fit
    pub fn check_room(&self) -> Result<()> {
        let mmap = self.mmap.as_ref().ok_or(LogError::Closed)?;
        if (mmap.len() as u64) < self.size + ENTRY_WIDTH {
            return Err(LogError::EndOfData);
        }
        Ok(())
    }

    /// Whether one more entry fits in the mapped capacity
    pub fn has_room(&self) -> bool {
        self.check_room().is_ok()
    }

    /// Drop every entry from slot `n` on
    pub(crate) fn truncate_entries(&mut self, n: u64) {
        self.size = self.size.min(n * ENTRY_WIDTH);
    }

    /// Number of entries
    pub fn len(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Logical size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sync the map and file, shrink the file to the logical size and
    /// release it
    ///
    /// The map and the file handle are released even when a step fails.
    pub fn close(&mut self) -> Result<()> {
        let (Some(mmap), Some(file)) = (self.mmap.take(), self.file.take()) else {
            return Ok(());
        };

        mmap.flush()?;
        file.sync_all()?;
        drop(mmap);

        file.set_len(self.size)?;
        file.sync_all()?;
        Ok(())
    }

    /// Whether `close` has released the map and file
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}
