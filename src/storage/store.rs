use crate::error::{LogError, Result};
use crate::storage::encoding::{decode_len, encode_len, LEN_WIDTH};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A Store holds record payloads as length-prefixed frames in one file.
///
/// Responsibilities:
/// - Append payloads through a buffered writer
/// - Hand back the byte position each frame starts at
/// - Serve random reads of a frame by position
///
/// NOT responsible for:
/// - Offset assignment (Segment)
/// - Offset → position lookup (Index)
/// - Deleting its file
///
/// ## On-disk format:
/// ```text
/// | length: u64 | payload: [u8] | length: u64 | payload: [u8] | ...
/// ```
/// Frames start at byte 0 and are concatenated with no separator, checksum or
/// padding.
///
/// ## Thread safety:
/// Every operation takes the same mutex. Reads flush the write buffer while
/// holding it, so a read issued after an append returns always sees that
/// append, and no reader observes a half-written frame.
pub struct Store {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// Buffered writer over the store file.
    /// Flushed before every read and on close.
    buf: BufWriter<File>,

    /// Bytes of valid frames written so far.
    /// Equals the position the next frame will start at. Only appends move it.
    size: u64,
}

impl Store {
    /// Wrap an already-open store file.
    ///
    /// The current file length becomes the store size, so reopening a store
    /// continues after its last frame.
    pub fn new(mut file: File) -> Result<Self> {
        let size = file.metadata()?.len();

        // Writes must land at `size` even if the caller did not open in append mode.
        file.seek(SeekFrom::End(0))?;

        debug!(size, "opened store");

        Ok(Store {
            inner: Mutex::new(StoreInner {
                buf: BufWriter::new(file),
                size,
            }),
        })
    }

    /// Open or create a store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path.as_ref())?;

        Self::new(file)
    }

    /// Append one payload as a frame.
    ///
    /// Returns `(bytes_written, position)` where `bytes_written` includes the
    /// 8-byte length prefix and `position` is where the frame starts.
    ///
    /// If the underlying write fails the store state is unspecified; callers
    /// must not keep appending without checking it.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.lock()?;

        let position = inner.size;

        inner.buf.write_all(&encode_len(payload.len() as u64))?;
        inner.buf.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;

        Ok((written, position))
    }

    /// Read the payload of the frame starting at `position`.
    ///
    /// # Errors
    /// - `EndOfData` if `position` or the frame it describes lies past the
    ///   written data
    /// - `Io` on flush or read failure
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut inner = self.lock()?;
        inner.buf.flush()?;

        let size = inner.size;
        if position.checked_add(LEN_WIDTH).map_or(true, |end| end > size) {
            return Err(LogError::EndOfData(format!(
                "no frame at position {} (store size {})",
                position, size
            )));
        }

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        read_exact_at(&mut inner, &mut len_buf, position)?;
        let len = decode_len(len_buf);

        // Check against size before allocating, a bad position can decode to any length.
        let payload_start = position + LEN_WIDTH;
        if payload_start.checked_add(len).map_or(true, |end| end > size) {
            return Err(LogError::EndOfData(format!(
                "frame at position {} claims {} bytes, store size {}",
                position, len, size
            )));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact_at(&mut inner, &mut payload, payload_start)?;

        Ok(payload)
    }

    /// Raw positional read into `buf`, after flushing buffered appends.
    ///
    /// Returns the number of bytes read. This is short of `buf.len()` only when
    /// the read reaches the end of the store.
    ///
    /// # Errors
    /// - `EndOfData` if `offset` is at or past the end and `buf` is non-empty
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.buf.flush()?;

        if buf.is_empty() {
            return Ok(0);
        }
        if offset >= inner.size {
            return Err(LogError::EndOfData(format!(
                "offset {} is past store size {}",
                offset, inner.size
            )));
        }

        Ok(read_full_at(&mut inner, buf, offset)?)
    }

    /// Stream the whole store from byte 0.
    pub fn reader(&self) -> StoreReader<'_> {
        StoreReader {
            store: self,
            position: 0,
        }
    }

    /// Bytes of valid frames written so far, buffered appends included.
    pub fn size(&self) -> Result<u64> {
        Ok(self.lock()?.size)
    }

    /// Flush buffered appends, then close the file.
    ///
    /// The flush is always attempted first; its error is returned before any
    /// close happens.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner().map_err(|_| LogError::LockPoisoned)?;
        let size = inner.size;

        let file = inner
            .buf
            .into_inner()
            .map_err(|e| LogError::Io(e.into_error()))?;
        drop(file);

        debug!(size, "closed store");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| LogError::LockPoisoned)
    }
}

/// Sequential `Read` over a whole store, built on `Store::read_at`.
///
/// Used to copy a store out (backup, snapshot). Each call takes the store lock
/// once, so appends may interleave between calls; the reader picks them up.
pub struct StoreReader<'a> {
    store: &'a Store,
    position: u64,
}

impl Read for StoreReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.store.read_at(buf, self.position) {
            Ok(n) => {
                self.position += n as u64;
                Ok(n)
            }
            Err(e) if e.is_end_of_data() => Ok(0),
            Err(LogError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

fn read_exact_at(inner: &mut StoreInner, buf: &mut [u8], offset: u64) -> Result<()> {
    let n = read_full_at(inner, buf, offset)?;
    if n < buf.len() {
        return Err(LogError::EndOfData(format!(
            "wanted {} bytes at {}, got {}",
            buf.len(),
            offset,
            n
        )));
    }
    Ok(())
}

/// Fill `buf` from `offset` until it is full or the file ends.
fn read_full_at(inner: &mut StoreInner, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match pread(inner, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn pread(inner: &mut StoreInner, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    inner.buf.get_ref().read_at(buf, offset)
}

#[cfg(windows)]
fn pread(inner: &mut StoreInner, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    // seek_read moves the cursor; put it back at the end for the next append.
    let file = inner.buf.get_mut();
    let n = file.seek_read(buf, offset)?;
    file.seek(SeekFrom::End(0))?;
    Ok(n)
}
