use std::path::Path;

use crate::constants::EMPTY_ROW;
use crate::error::{Error, Result};
use crate::records::RecordStore;
use crate::slab::SlabTable;

/// Key → insertion-ordered, LIFO-deletable list of fixed-size rows.
///
/// Two files: a lookup table mapping each key to the index of its head
/// record, and a record arena where each record links to the previous head.
/// `add_row` prepends in O(1); `delete_last_row` removes exactly the most
/// recent row, which is what makes a chain-reorganization rollback undo
/// `add_row` calls symmetrically.
#[derive(Debug)]
pub struct RecordMultimap {
    lookup: SlabTable,
    rows: RecordStore,
}

impl RecordMultimap {
    pub fn create(
        lookup_path: &Path,
        rows_path: &Path,
        bucket_count: u32,
        row_size: u32,
    ) -> Result<Self> {
        Ok(RecordMultimap {
            lookup: SlabTable::create(lookup_path, bucket_count)?,
            rows: RecordStore::create(rows_path, row_size)?,
        })
    }

    pub fn start(
        lookup_path: &Path,
        rows_path: &Path,
        bucket_count: u32,
        row_size: u32,
        readonly: bool,
    ) -> Result<Self> {
        Ok(RecordMultimap {
            lookup: SlabTable::start(lookup_path, bucket_count, readonly)?,
            rows: RecordStore::start(rows_path, row_size, readonly)?,
        })
    }

    /// Head record index for a key, or `None` for a key with no rows.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<u32>> {
        match self.lookup.find(key)? {
            Some(bytes) => {
                let head: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Corrupted("multimap head is not 4 bytes"))?;
                Ok(Some(u32::from_le_bytes(head)))
            }
            None => Ok(None),
        }
    }

    /// Prepend a row to the key's list.
    pub fn add_row(&self, key: &[u8], row: &[u8]) -> Result<()> {
        let head = self.lookup(key)?;

        let index = self.rows.allocate()?;
        self.rows.write_row(index, head.unwrap_or(EMPTY_ROW), row)?;

        let head_bytes = index.to_le_bytes();
        match head {
            // The head slot is rewritten in place; its length never changes.
            Some(_) => {
                if !self.lookup.update(key, &head_bytes)? {
                    return Err(Error::Corrupted("multimap head vanished during add"));
                }
            }
            None => self.lookup.store(key, &head_bytes)?,
        }
        Ok(())
    }

    /// Lazily iterate the key's rows, most recent first. Each step is an
    /// independent indexed lookup, so the iterator stays valid across region
    /// growth and can be restarted from a fresh `lookup` at any time.
    pub fn rows(&self, key: &[u8]) -> Result<RowIter<'_>> {
        Ok(RowIter {
            rows: &self.rows,
            next: self.lookup(key)?.unwrap_or(EMPTY_ROW),
        })
    }

    /// Remove exactly the most recently added row for the key.
    ///
    /// Returns false when the key has no rows; over-deleting is a clean
    /// no-op for the rest of the table.
    pub fn delete_last_row(&self, key: &[u8]) -> Result<bool> {
        let head = match self.lookup(key)? {
            Some(head) => head,
            None => return Ok(false),
        };

        let next = self.rows.next(head)?;
        if next == EMPTY_ROW {
            if !self.lookup.unlink(key)? {
                return Err(Error::Corrupted("multimap head vanished during delete"));
            }
        } else if !self.lookup.update(key, &next.to_le_bytes())? {
            return Err(Error::Corrupted("multimap head vanished during delete"));
        }
        Ok(true)
    }

    /// Persist both files' allocation cursors and flush.
    pub fn sync(&self) -> Result<()> {
        self.lookup.sync()?;
        self.rows.sync()
    }
}

/// Iterator over one key's rows, newest first.
pub struct RowIter<'a> {
    rows: &'a RecordStore,
    next: u32,
}

impl Iterator for RowIter<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == EMPTY_ROW {
            return None;
        }
        let index = self.next;
        match self.rows.next(index) {
            Ok(next) => self.next = next,
            Err(err) => {
                self.next = EMPTY_ROW;
                return Some(Err(err));
            }
        }
        Some(self.rows.payload(index))
    }
}
