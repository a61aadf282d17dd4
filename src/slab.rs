use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::buckets::BucketIndex;
use crate::constants::{
    CURSOR_OFFSET, EMPTY_SLOT, FILE_HEADER_SIZE, GROW_CHUNK, SLAB_HEADER_SIZE, STORE_MAGIC,
    STORE_VERSION,
};
use crate::error::{Error, Result};
use crate::region::{MappedRegion, RegionView};

/// Where an entry is linked from, for splice operations.
enum Link {
    Bucket(u32),
    Entry(u64),
}

/// Location of a matched slab within the region.
struct SlabHit {
    /// Where the entry is linked from; the next-link of a predecessor entry
    /// sits at the predecessor's own offset
    link: Link,
    /// Link to the rest of the chain
    next: u64,
    /// Offset of the value bytes
    value: u64,
    /// Length of the value bytes
    value_len: u32,
}

/// Hash-indexed store of unique key → variable-length value.
///
/// One file: `[header][bucket array][slab area]`, the slab area append-only.
/// Each slab is `[next u64][key_len u32][value_len u32][key][value]`, spliced
/// to the front of its bucket's chain. Same-key duplicates are not detected
/// here; callers wanting last-value semantics unlink the stale entry first.
/// Removed slabs are unlinked, never reclaimed.
#[derive(Debug)]
pub struct SlabTable {
    region: MappedRegion,
    buckets: BucketIndex,
    /// Next free slab offset, persisted to the header on `sync`
    cursor: AtomicU64,
}

impl SlabTable {
    /// Create an empty table file with a fixed bucket count.
    pub fn create(path: &Path, bucket_count: u32) -> Result<Self> {
        let buckets = BucketIndex::new(FILE_HEADER_SIZE, bucket_count);
        let region = MappedRegion::create(path, buckets.end())?;

        {
            let view = region.view();
            view.write_u32(0, STORE_MAGIC)?;
            view.write_u32(4, STORE_VERSION)?;
            view.write_u32(8, bucket_count)?;
            view.write_u32(12, 0)?;
            view.write_u64(CURSOR_OFFSET, buckets.end())?;
            buckets.initialize(&view)?;
        }
        region.flush()?;

        debug!(
            "created slab table {} with {} buckets",
            path.display(),
            bucket_count
        );
        Ok(SlabTable {
            region,
            buckets,
            cursor: AtomicU64::new(buckets.end()),
        })
    }

    /// Map an existing table file and validate its header.
    ///
    /// A header mismatch is fatal: it means an incompatible on-disk format,
    /// not something to repair in flight.
    pub fn start(path: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        let region = MappedRegion::open(path, readonly)?;
        let buckets = BucketIndex::new(FILE_HEADER_SIZE, bucket_count);

        let cursor = {
            let view = region.view();
            if view.read_u32(0)? != STORE_MAGIC {
                return Err(Error::BadMagic);
            }
            // Layout is stable within a major version; minor bumps only
            // touch the metadata file.
            let version = view.read_u32(4)?;
            if version >> 16 != STORE_VERSION >> 16 {
                return Err(Error::VersionMismatch {
                    found: version,
                    expected: STORE_VERSION,
                });
            }
            let on_disk = view.read_u32(8)?;
            if on_disk != bucket_count {
                return Err(Error::BucketCountMismatch {
                    on_disk,
                    configured: bucket_count,
                });
            }
            let cursor = view.read_u64(CURSOR_OFFSET)?;
            if cursor < buckets.end() || cursor > view.len() {
                return Err(Error::Corrupted("allocation cursor out of range"));
            }
            cursor
        };

        Ok(SlabTable {
            region,
            buckets,
            cursor: AtomicU64::new(cursor),
        })
    }

    /// Reserve `size` bytes at the cursor, growing the region first when the
    /// new cursor would overflow it. Doubling with a fixed floor; monotonic.
    fn allocate(&self, size: u64) -> Result<u64> {
        let offset = self.cursor.load(Ordering::Acquire);
        let end = offset
            .checked_add(size)
            .ok_or(Error::Corrupted("allocation cursor overflow"))?;

        let mapped = self.region.len();
        if end > mapped {
            let mut target = mapped.max(GROW_CHUNK);
            while target < end {
                target = target.saturating_mul(2);
            }
            self.region.resize(target)?;
        }

        self.cursor.store(end, Ordering::Release);
        Ok(offset)
    }

    /// Store a key/value pair, prepending it to the bucket's chain.
    pub fn store(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let size = SLAB_HEADER_SIZE + key.len() as u64 + value.len() as u64;
        let offset = self.allocate(size)?;

        // The view is taken after allocate: growing swapped the mapping.
        let view = self.region.view();
        let bucket = self.buckets.bucket_of(key);
        let head = self.buckets.head(&view, bucket)?;

        view.write_u64(offset, head)?;
        view.write_u32(offset + 8, key.len() as u32)?;
        view.write_u32(offset + 12, value.len() as u32)?;
        view.write(offset + SLAB_HEADER_SIZE, key)?;
        view.write(offset + SLAB_HEADER_SIZE + key.len() as u64, value)?;

        // Publish last so a mid-write reader walks the old chain.
        self.buckets.set_head(&view, bucket, offset)
    }

    /// Look up the first exact match. Absent keys are `Ok(None)`.
    pub fn find(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let view = self.region.view();
        match self.find_in(&view, key)? {
            Some(hit) => {
                let bytes = view.slice(hit.value, hit.value_len as usize)?;
                Ok(Some(bytes.to_vec()))
            }
            None => Ok(None),
        }
    }

    /// Overwrite a stored value in place. The replacement must be the same
    /// length as the stored value. Returns false when the key is absent.
    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let view = self.region.view();
        match self.find_in(&view, key)? {
            Some(hit) => {
                if hit.value_len as usize != value.len() {
                    return Err(Error::BadRowSize {
                        got: value.len(),
                        expected: hit.value_len as usize,
                    });
                }
                view.write(hit.value, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Splice the first match out of its chain, leaving its bytes allocated
    /// but unreachable. Returns whether a match was found.
    pub fn unlink(&self, key: &[u8]) -> Result<bool> {
        let view = self.region.view();
        match self.find_in(&view, key)? {
            Some(hit) => {
                match hit.link {
                    Link::Bucket(bucket) => self.buckets.set_head(&view, bucket, hit.next)?,
                    Link::Entry(link_offset) => view.write_u64(link_offset, hit.next)?,
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persist the allocation cursor and flush the region, so a restart sees
    /// a cursor consistent with the slab bytes.
    pub fn sync(&self) -> Result<()> {
        let view = self.region.view();
        view.write_u64(CURSOR_OFFSET, self.cursor.load(Ordering::Acquire))?;
        drop(view);
        self.region.flush()
    }

    /// Walk a bucket chain for `key`.
    ///
    /// Chains link strictly towards older (lower) offsets, since entries are
    /// prepended in allocation order; a link that fails to decrease is store
    /// corruption, which also rules out cycles.
    fn find_in(&self, view: &RegionView<'_>, key: &[u8]) -> Result<Option<SlabHit>> {
        let bucket = self.buckets.bucket_of(key);
        let cursor = self.cursor.load(Ordering::Acquire);

        let mut offset = self.buckets.head(view, bucket)?;
        let mut link = Link::Bucket(bucket);

        while offset != EMPTY_SLOT {
            if offset < self.buckets.end() || offset >= cursor {
                return Err(Error::Corrupted("chain offset out of slab area"));
            }

            let next = view.read_u64(offset)?;
            if next != EMPTY_SLOT && next >= offset {
                return Err(Error::Corrupted("chain link does not decrease"));
            }
            let key_len = view.read_u32(offset + 8)? as usize;
            let value_len = view.read_u32(offset + 12)?;

            let stored_key = view.slice(offset + SLAB_HEADER_SIZE, key_len)?;
            if stored_key == key {
                return Ok(Some(SlabHit {
                    link,
                    next,
                    value: offset + SLAB_HEADER_SIZE + key_len as u64,
                    value_len,
                }));
            }

            link = Link::Entry(offset);
            offset = next;
        }

        Ok(None)
    }
}
