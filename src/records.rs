use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::constants::{
    CURSOR_OFFSET, EMPTY_ROW, FILE_HEADER_SIZE, GROW_CHUNK, RECORD_LINK_SIZE, STORE_MAGIC,
    STORE_VERSION,
};
use crate::error::{Error, Result};
use crate::region::MappedRegion;

/// Append-only arena of homogeneous fixed-size rows, addressed by sequential
/// index.
///
/// One file: `[header][record area]`, record = `[next u32][payload]` with
/// [`EMPTY_ROW`] terminating a chain. Rows double as arena entries for the
/// record multimap (the `next` link) and as a plain sequence (`count` +
/// `payload(i)`) for adapters that enumerate everything stored.
#[derive(Debug)]
pub struct RecordStore {
    region: MappedRegion,
    /// Payload bytes per record, excluding the link
    row_size: u32,
    /// Number of allocated records, persisted to the header on `sync`
    count: AtomicU32,
}

impl RecordStore {
    /// Create an empty record file for rows of `row_size` payload bytes.
    pub fn create(path: &Path, row_size: u32) -> Result<Self> {
        debug_assert!(row_size > 0);
        let region = MappedRegion::create(path, FILE_HEADER_SIZE)?;

        {
            let view = region.view();
            view.write_u32(0, STORE_MAGIC)?;
            view.write_u32(4, STORE_VERSION)?;
            view.write_u32(8, row_size)?;
            view.write_u32(12, 0)?;
            view.write_u64(CURSOR_OFFSET, 0)?;
        }
        region.flush()?;

        debug!(
            "created record store {} with {}-byte rows",
            path.display(),
            row_size
        );
        Ok(RecordStore {
            region,
            row_size,
            count: AtomicU32::new(0),
        })
    }

    /// Map an existing record file and validate its header.
    pub fn start(path: &Path, row_size: u32, readonly: bool) -> Result<Self> {
        let region = MappedRegion::open(path, readonly)?;

        let count = {
            let view = region.view();
            if view.read_u32(0)? != STORE_MAGIC {
                return Err(Error::BadMagic);
            }
            // Same-major layouts are compatible, matching the lookup tables.
            let version = view.read_u32(4)?;
            if version >> 16 != STORE_VERSION >> 16 {
                return Err(Error::VersionMismatch {
                    found: version,
                    expected: STORE_VERSION,
                });
            }
            let on_disk = view.read_u32(8)?;
            if on_disk != row_size {
                return Err(Error::RowSizeMismatch {
                    on_disk,
                    configured: row_size,
                });
            }
            let count = view.read_u64(CURSOR_OFFSET)?;
            if count > EMPTY_ROW as u64 {
                return Err(Error::Corrupted("record count exceeds index width"));
            }
            let end = FILE_HEADER_SIZE + count * (RECORD_LINK_SIZE + row_size as u64);
            if end > view.len() {
                return Err(Error::Corrupted("record count past mapped length"));
            }
            count as u32
        };

        Ok(RecordStore {
            region,
            row_size,
            count: AtomicU32::new(count),
        })
    }

    /// Number of records allocated so far. Indices `0..count` are valid.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    fn record_offset(&self, index: u32) -> Result<u64> {
        if index >= self.count() {
            return Err(Error::Corrupted("record index past arena length"));
        }
        Ok(FILE_HEADER_SIZE + index as u64 * (RECORD_LINK_SIZE + self.row_size as u64))
    }

    /// Reserve the next sequential record, growing the region if required.
    /// The record's link and payload are uninitialized until `write_row`.
    pub fn allocate(&self) -> Result<u32> {
        let index = self.count.load(Ordering::Acquire);
        if index == EMPTY_ROW {
            return Err(Error::Corrupted("record arena full"));
        }

        let end = FILE_HEADER_SIZE + (index as u64 + 1) * (RECORD_LINK_SIZE + self.row_size as u64);
        let mapped = self.region.len();
        if end > mapped {
            let mut target = mapped.max(GROW_CHUNK);
            while target < end {
                target = target.saturating_mul(2);
            }
            self.region.resize(target)?;
        }

        self.count.store(index + 1, Ordering::Release);
        Ok(index)
    }

    /// Fill a freshly allocated record with its link and payload.
    pub fn write_row(&self, index: u32, next: u32, payload: &[u8]) -> Result<()> {
        if payload.len() != self.row_size as usize {
            return Err(Error::BadRowSize {
                got: payload.len(),
                expected: self.row_size as usize,
            });
        }
        let offset = self.record_offset(index)?;
        let view = self.region.view();
        view.write_u32(offset, next)?;
        view.write(offset + RECORD_LINK_SIZE, payload)
    }

    /// Copy out a record's payload bytes.
    pub fn payload(&self, index: u32) -> Result<Vec<u8>> {
        let offset = self.record_offset(index)?;
        let view = self.region.view();
        Ok(view
            .slice(offset + RECORD_LINK_SIZE, self.row_size as usize)?
            .to_vec())
    }

    /// A record's chain link.
    pub fn next(&self, index: u32) -> Result<u32> {
        let offset = self.record_offset(index)?;
        self.region.view().read_u32(offset)
    }

    /// Persist the record count and flush the region.
    pub fn sync(&self) -> Result<()> {
        let view = self.region.view();
        view.write_u64(CURSOR_OFFSET, self.count() as u64)?;
        drop(view);
        self.region.flush()
    }
}
