use crate::config::Config;
use crate::error::{LogError, Result};
use crate::storage::encoding::{decode_entry, encode_entry, ENT_WIDTH};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sentinel for `Index::read`: the most recently written entry.
pub const LAST_ENTRY: i64 = -1;

/// An Index maps entry numbers to byte positions in the segment's store.
///
/// Purpose:
/// - O(1) lookup of where a record's frame starts, by direct addressing
/// - No scanning, no binary search
///
/// Responsibilities:
/// - Own a `.index` file and a shared read/write mapping over it
/// - Append fixed-width entries
/// - Track logical size separately from mapped capacity
///
/// NOT responsible for:
/// - Reading store data
/// - Translating log offsets (entry numbers are segment-relative)
/// - Locking (the owner serializes access)
///
/// ## On-disk format:
/// Entry `n` lives at byte `n * 12`:
/// ```text
/// | offset: u32 | position: u64 |
/// | 4 bytes     | 8 bytes       |
/// ```
/// While open the file is preallocated to `max_index_bytes`. A clean
/// `close` truncates it back to exactly the written entries.
///
/// ## Two sizes:
/// - `size`: bytes of entries written, always a multiple of 12
/// - `capacity`: bytes mapped, fixed at construction
///
/// Only `[0, size)` holds entries; `[size, capacity)` is reserved space and is
/// never returned by `read`.
///
/// ## Ownership:
/// - Not Sync-safe on its own for writes: `write` takes `&mut self`
/// - The owning Segment holds one guard across the matching store append and
///   index write
pub struct Index {
    /// File handle for the `.index` file.
    file: File,

    /// Path of the `.index` file, for diagnostics.
    path: PathBuf,

    /// Shared read/write mapping of the whole preallocated file.
    /// Created once, never remapped.
    mmap: MmapMut,

    /// Bytes of entries written. Where the next entry goes.
    size: u64,

    /// Bytes mapped. `size + ENT_WIDTH > capacity` means full.
    capacity: u64,
}

impl Index {
    /// Build an index over an already-open file.
    ///
    /// The file's current length is taken as the logical size before the file
    /// is grown to `max_index_bytes` and mapped, so an existing index keeps its
    /// entries.
    ///
    /// The file must be open for both reading and writing.
    ///
    /// # Errors
    /// - `InvalidConfig` if the capacity cannot hold one entry
    /// - `CorruptIndex` if the existing length is not a whole number of entries
    ///   or is larger than the configured capacity
    /// - `Io` on stat, resize or map failure
    pub fn new(file: File, path: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        config.validate()?;
        let path = path.into();

        let size = file.metadata()?.len();
        let capacity = config.segment.max_index_bytes;

        if size % ENT_WIDTH != 0 {
            return Err(LogError::CorruptIndex(format!(
                "{}: size {} is not divisible by {}",
                path.display(),
                size,
                ENT_WIDTH
            )));
        }

        if size > capacity {
            return Err(LogError::CorruptIndex(format!(
                "{}: holds {} bytes, more than the configured capacity {}",
                path.display(),
                size,
                capacity
            )));
        }

        usize::try_from(capacity).map_err(|_| {
            LogError::InvalidConfig(format!("max_index_bytes {} does not fit in memory", capacity))
        })?;

        file.set_len(capacity)?;

        // SAFETY: the file is owned by this Index for the lifetime of the
        // mapping and its length is only changed in `close`, after the
        // mapping has been dropped. Reads and writes through the mapping are
        // bounds-checked against `size` and `capacity` below.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        debug!(
            path = %path.display(),
            size,
            capacity,
            "opened index"
        );

        Ok(Index {
            file,
            path,
            mmap,
            size,
            capacity,
        })
    }

    /// Open or create an index file at `path`.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        Self::new(file, path, config)
    }

    /// Append an entry mapping `offset` to store `position`.
    ///
    /// Nothing is synced to disk here; durability comes from `close`.
    ///
    /// # Errors
    /// - `CapacityExceeded` if the entry does not fit; `size` is left as is
    pub fn write(&mut self, offset: u32, position: u64) -> Result<()> {
        let end = self.size + ENT_WIDTH;
        if end > self.capacity {
            warn!(
                path = %self.path.display(),
                size = self.size,
                capacity = self.capacity,
                "index full"
            );
            return Err(self.capacity_exceeded());
        }

        let range = self.byte_range(self.size)?;
        let full = self.capacity_exceeded();
        let slot = self.mmap.get_mut(range).ok_or(full)?;
        slot.copy_from_slice(&encode_entry(offset, position));

        self.size = end;
        Ok(())
    }

    /// Read entry `entry` as `(offset, position)`.
    ///
    /// `LAST_ENTRY` (-1) reads the most recently written entry. Any other
    /// value is a zero-based entry number within this index.
    ///
    /// # Errors
    /// - `EndOfData` if the index is empty, or the entry was never written
    ///   (even when it falls inside the preallocated capacity)
    pub fn read(&self, entry: i64) -> Result<(u32, u64)> {
        if self.size == 0 {
            return Err(LogError::EndOfData(format!(
                "{}: index is empty",
                self.path.display()
            )));
        }

        let entry = match entry {
            LAST_ENTRY => self.entries() - 1,
            n if n < 0 => {
                return Err(LogError::EndOfData(format!("invalid entry number {}", n)));
            }
            n => n as u64,
        };

        let start = entry
            .checked_mul(ENT_WIDTH)
            .filter(|start| start.checked_add(ENT_WIDTH).map_or(false, |end| end <= self.size))
            .ok_or_else(|| {
                LogError::EndOfData(format!(
                    "entry {} not written ({} entries)",
                    entry,
                    self.entries()
                ))
            })?;

        let bytes: &[u8; ENT_WIDTH as usize] = self
            .mmap
            .get(self.byte_range(start)?)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| LogError::EndOfData(format!("entry {} outside mapping", entry)))?;

        Ok(decode_entry(bytes))
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Bytes of entries written.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes preallocated and mapped.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of entries written.
    pub fn entries(&self) -> u64 {
        self.size / ENT_WIDTH
    }

    /// True when one more entry would not fit.
    pub fn is_full(&self) -> bool {
        self.size + ENT_WIDTH > self.capacity
    }

    /// Sync and shrink the file to the written entries, then close it.
    ///
    /// Steps run in a fixed order and stop at the first failure:
    /// mapping sync, file sync, unmap, truncate to `size`, close. Truncating
    /// before the syncs could lose entries that only live in the mapping.
    pub fn close(self) -> Result<()> {
        let Index {
            file,
            path,
            mmap,
            size,
            ..
        } = self;

        mmap.flush()?;
        file.sync_all()?;
        drop(mmap);

        file.set_len(size)?;
        drop(file);

        debug!(path = %path.display(), size, "closed index");
        Ok(())
    }

    fn byte_range(&self, start: u64) -> Result<Range<usize>> {
        let start = usize::try_from(start).map_err(|_| self.capacity_exceeded())?;
        Ok(start..start + ENT_WIDTH as usize)
    }

    fn capacity_exceeded(&self) -> LogError {
        LogError::CapacityExceeded {
            size: self.size,
            capacity: self.capacity,
        }
    }
}
