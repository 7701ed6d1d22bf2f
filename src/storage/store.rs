//! Store
//!
//! Append-only file of length-framed payloads.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────────┬──────────────────────┐
//! │ Length: u64 BE (8)   │ Payload (Length)     │
//! └──────────────────────┴──────────────────────┘
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use bytes::{Buf, BufMut};
use parking_lot::Mutex;

use crate::error::{LogError, Result};

/// Width of the big-endian length prefix in front of every payload
pub const LEN_WIDTH: u64 = 8;

/// Append-only framed byte store
///
/// ## Concurrency:
/// - One mutex guards the buffered writer, the file handle and `size`
/// - Reads flush first, so they observe every prior append
pub struct Store {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// `None` once closed
    writer: Option<BufWriter<File>>,
    /// Logical end of data, including bytes still buffered
    size: u64,
    /// Set when a frame was only partly written; `size` no longer matches
    /// the file and further appends are refused
    poisoned: bool,
}

impl StoreInner {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or(LogError::Closed)
    }

    /// Flush buffered frames and hand back the raw file
    fn flushed_file(&mut self) -> Result<&mut File> {
        let writer = self.writer()?;
        writer.flush()?;
        Ok(writer.get_mut())
    }

    /// Payload length of the frame at `position`, if the whole frame lies
    /// within `size`
    fn frame_at(&mut self, position: u64) -> Result<Option<u64>> {
        let size = self.size;
        match position.checked_add(LEN_WIDTH) {
            Some(end) if end <= size => {}
            _ => return Ok(None),
        }

        let file = self.flushed_file()?;
        file.seek(SeekFrom::Start(position))?;
        let mut header = [0u8; LEN_WIDTH as usize];
        file.read_exact(&mut header)?;

        let len = (&header[..]).get_u64();
        match (position + LEN_WIDTH).checked_add(len) {
            Some(end) if end <= size => Ok(Some(len)),
            _ => Ok(None),
        }
    }
}

impl Store {
    /// Wrap a file opened in append mode; logical size is its current length
    pub fn open(file: File) -> Result<Self> {
        let size = file.metadata()?.len();

        Ok(Self {
            inner: Mutex::new(StoreInner {
                writer: Some(BufWriter::new(file)),
                size,
                poisoned: false,
            }),
        })
    }

    /// Append one frame
    ///
    /// Returns `(bytes_written, start_position)` where `bytes_written`
    /// includes the length prefix and `start_position` is where the frame
    /// begins.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.lock();
        if inner.poisoned {
            return Err(LogError::Poisoned(
                "a previous append was only partly written".to_string(),
            ));
        }
        let start = inner.size;

        let mut header = [0u8; LEN_WIDTH as usize];
        (&mut header[..]).put_u64(payload.len() as u64);

        let writer = inner.writer()?;
        let result = writer
            .write_all(&header)
            .and_then(|_| writer.write_all(payload));
        if let Err(e) = result {
            inner.poisoned = true;
            return Err(e.into());
        }

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;
        Ok((written, start))
    }

    /// Read the payload of the frame starting at `position`
    ///
    /// `UnexpectedEof` when the frame runs past the end of the store.
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let len = inner
            .frame_at(position)?
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;

        let file = inner.flushed_file()?;
        let mut payload = vec![0u8; len as usize];
        file.read_exact(&mut payload)?;

        Ok(payload)
    }

    /// Raw positioned read, ignoring frame boundaries. Returns 0 at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();
        let file = inner.flushed_file()?;

        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    /// Length of the frame payload at `position`, if the whole frame lies
    /// within the store
    pub(crate) fn frame_len(&self, position: u64) -> Result<Option<u64>> {
        self.inner.lock().frame_at(position)
    }

    /// Cut the file back to `size` bytes, dropping everything after it
    pub(crate) fn truncate(&self, size: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if size >= inner.size {
            return Ok(());
        }

        let file = inner.flushed_file()?;
        file.set_len(size)?;
        file.sync_all()?;
        inner.size = size;
        Ok(())
    }

    /// Logical size in bytes
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Flush, sync and release the file
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(mut writer) = inner.writer.take() else {
            return Ok(());
        };

        // One flush attempt; into_parts keeps Drop from flushing again
        let flushed = writer.flush();
        let (file, _) = writer.into_parts();
        flushed?;
        file.sync_all()?;
        Ok(())
    }
}

// =============================================================================
// Frame Parsing
// =============================================================================

/// Split a byte stream in store frame format back into payloads
pub fn frames<R: Read>(reader: R) -> Frames<R> {
    Frames { reader }
}

/// Iterator over the payloads of a framed byte stream
pub struct Frames<R> {
    reader: R,
}

impl<R: Read> Frames<R> {
    /// Fill the length prefix; `None` on a clean end of stream
    fn read_header(&mut self) -> io::Result<Option<u64>> {
        let mut header = [0u8; LEN_WIDTH as usize];
        let mut filled = 0;

        while filled < header.len() {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Some((&header[..]).get_u64()))
    }
}

impl<R: Read> Iterator for Frames<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = match self.read_header() {
            Ok(Some(len)) => len,
            Ok(None) => return None,
            Err(e) => return Some(Err(e.into())),
        };

        // Grow with the data actually present rather than trusting `len`
        let mut payload = Vec::new();
        let result = self
            .reader
            .by_ref()
            .take(len)
            .read_to_end(&mut payload)
            .map_err(LogError::from)
            .and_then(|n| {
                if n as u64 == len {
                    Ok(payload)
                } else {
                    Err(io::Error::from(io::ErrorKind::UnexpectedEof).into())
                }
            });
        Some(result)
    }
}
