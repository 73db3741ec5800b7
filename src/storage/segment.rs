use crate::config::Config;
use crate::error::{LogError, Result};
use crate::storage::encoding::ENT_WIDTH;
use crate::storage::index::{Index, LAST_ENTRY};
use crate::storage::store::{Store, StoreReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A record read from a segment.
///
/// Contains both the logical offset and the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Logical offset assigned when this record was appended.
    pub offset: u64,
    /// Record payload bytes.
    pub payload: Vec<u8>,
}

/// A Segment pairs one Store with one Index.
///
/// Responsibilities:
/// - Assign monotonically increasing logical offsets from `base_offset`
/// - Sequence each append: store frame first, index entry second
/// - Translate a logical offset to a segment-relative entry number
/// - Recover `next_offset` from the index when reopened
///
/// NOT responsible for:
/// - Choosing when to create the next segment (caller checks `is_maxed`)
/// - Addressing offsets held by other segments
///
/// ## Files:
/// - `<base_offset:020>.store`: record frames
/// - `<base_offset:020>.index`: entry number → store position
///
/// ## Thread safety:
/// The index and `next_offset` sit behind one mutex, held across the store
/// append and the index write of the same record. An index entry therefore
/// never exists for a record whose store append has not returned.
pub struct Segment {
    /// Logical offset of the first record. Encoded in both filenames.
    base_offset: u64,

    store: Store,

    state: Mutex<SegmentState>,

    store_path: PathBuf,
    index_path: PathBuf,

    config: Config,
}

struct SegmentState {
    index: Index,

    /// Offset the next append will be assigned.
    next_offset: u64,
}

impl Segment {
    /// Open or create the segment starting at `base_offset` inside `dir`.
    ///
    /// An existing segment resumes after the last indexed record.
    ///
    /// # Errors
    /// - `InvalidConfig` for an unusable config
    /// - `CorruptIndex` if the index file has a partial entry
    /// - `Io` opening, growing or mapping either file
    pub fn open(dir: impl AsRef<Path>, base_offset: u64, config: &Config) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref();

        let store_path = dir.join(format!("{:020}.store", base_offset));
        let index_path = dir.join(format!("{:020}.index", base_offset));

        let store = Store::open(&store_path)?;
        let index = Index::open(&index_path, config)?;

        let next_offset = match index.read(LAST_ENTRY) {
            Ok((relative, _)) => base_offset + relative as u64 + 1,
            Err(e) if e.is_end_of_data() => base_offset,
            Err(e) => return Err(e),
        };

        info!(
            base_offset,
            next_offset,
            store_size = store.size()?,
            "opened segment"
        );

        Ok(Segment {
            base_offset,
            store,
            state: Mutex::new(SegmentState { index, next_offset }),
            store_path,
            index_path,
            config: config.clone(),
        })
    }

    /// Append a record and return the offset it was assigned.
    ///
    /// # Errors
    /// - `CapacityExceeded` if the index has no room; nothing is written
    /// - `Io` if the store append fails
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        let mut state = self.lock()?;

        // Refuse before touching the store so a full index never leaves an
        // unindexed frame behind.
        if state.index.is_full() {
            return Err(LogError::CapacityExceeded {
                size: state.index.size(),
                capacity: state.index.capacity(),
            });
        }

        let offset = state.next_offset;
        let relative = u32::try_from(offset - self.base_offset).map_err(|_| {
            LogError::CapacityExceeded {
                size: state.index.size(),
                capacity: state.index.capacity(),
            }
        })?;

        let (_, position) = self.store.append(payload)?;
        state.index.write(relative, position)?;
        state.next_offset += 1;

        Ok(offset)
    }

    /// Read the record at logical `offset`.
    ///
    /// # Errors
    /// - `OffsetNotFound` if this segment holds no record at `offset`
    /// - `Io` on read failure
    pub fn read(&self, offset: u64) -> Result<Record> {
        let state = self.lock()?;

        if offset < self.base_offset || offset >= state.next_offset {
            return Err(LogError::OffsetNotFound(offset));
        }

        let relative = (offset - self.base_offset) as i64;
        let (_, position) = state.index.read(relative).map_err(|e| not_found(e, offset))?;
        let payload = self.store.read(position).map_err(|e| not_found(e, offset))?;

        Ok(Record { offset, payload })
    }

    /// True once either file reached its configured limit.
    pub fn is_maxed(&self) -> Result<bool> {
        let state = self.lock()?;
        let store_size = self.store.size()?;
        Ok(store_size >= self.config.segment.max_store_bytes
            || state.index.size() + ENT_WIDTH > state.index.capacity())
    }

    /// Stream the raw store file (frames, not records).
    pub fn store_reader(&self) -> StoreReader<'_> {
        self.store.reader()
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Offset the next append will be assigned.
    pub fn next_offset(&self) -> Result<u64> {
        Ok(self.lock()?.next_offset)
    }

    /// Number of records in this segment.
    pub fn record_count(&self) -> Result<u64> {
        Ok(self.next_offset()? - self.base_offset)
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Close the index (sync + truncate) and then the store (flush).
    pub fn close(self) -> Result<()> {
        let state = self.state.into_inner().map_err(|_| LogError::LockPoisoned)?;
        let next_offset = state.next_offset;

        state.index.close()?;
        self.store.close()?;

        info!(base_offset = self.base_offset, next_offset, "closed segment");
        Ok(())
    }

    /// Close the segment and delete both of its files.
    pub fn remove(self) -> Result<()> {
        let store_path = self.store_path.clone();
        let index_path = self.index_path.clone();

        self.close()?;
        std::fs::remove_file(&index_path)?;
        std::fs::remove_file(&store_path)?;

        debug!(path = %store_path.display(), "removed segment");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SegmentState>> {
        self.state.lock().map_err(|_| LogError::LockPoisoned)
    }
}

fn not_found(e: LogError, offset: u64) -> LogError {
    if e.is_end_of_data() {
        LogError::OffsetNotFound(offset)
    } else {
        e
    }
}
