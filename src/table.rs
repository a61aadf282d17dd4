use std::marker::PhantomData;
use std::path::Path;

use crate::error::{Error, Result};
use crate::multimap::RecordMultimap;
use crate::slab::SlabTable;

/// Translates a domain key into the bytes the hash tables index.
pub trait KeyEncode {
    fn key_bytes(&self) -> Vec<u8>;
}

impl KeyEncode for [u8; 32] {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl KeyEncode for [u8; 20] {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl KeyEncode for str {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// Variable-length value codec for blob tables.
pub trait ValueCodec: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Raw payloads pass through unframed.
impl ValueCodec for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

/// Fixed-size row codec for multimap tables.
pub trait RowCodec: Sized {
    /// Encoded size; every row of a table has exactly this many bytes.
    const SIZE: usize;

    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Unique key → value table typed over a codec pair.
///
/// Every domain entity backed by the blob hash table is this struct with a
/// different codec; the bucket/slab wiring lives in one place. Two write
/// paths with different overwrite semantics: `insert` prepends and shadows
/// any previous value so `remove` re-exposes it (the rollback-exact path),
/// `store` unlinks the stale entry first for plain last-value semantics.
#[derive(Debug)]
pub struct BlobTable<K: KeyEncode + ?Sized, V: ValueCodec> {
    inner: SlabTable,
    _codec: PhantomData<fn(&K) -> V>,
}

impl<K: KeyEncode + ?Sized, V: ValueCodec> BlobTable<K, V> {
    pub fn create(path: &Path, bucket_count: u32) -> Result<Self> {
        Ok(BlobTable {
            inner: SlabTable::create(path, bucket_count)?,
            _codec: PhantomData,
        })
    }

    pub fn start(path: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(BlobTable {
            inner: SlabTable::start(path, bucket_count, readonly)?,
            _codec: PhantomData,
        })
    }

    /// Prepend a value without touching any existing entry for the key.
    ///
    /// The new value shadows the old one at the chain head, and unlinking it
    /// with `remove` re-exposes the previous value. Block application uses
    /// this so a reorg rollback restores overwritten entries exactly.
    pub fn insert(&self, key: &K, value: &V) -> Result<()> {
        self.inner.store(&key.key_bytes(), &value.encode())
    }

    /// Store a value, replacing any previous value for the key.
    pub fn store(&self, key: &K, value: &V) -> Result<()> {
        let key = key.key_bytes();
        self.inner.unlink(&key)?;
        self.inner.store(&key, &value.encode())
    }

    /// Fetch and decode the value for a key; absent keys are `Ok(None)`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        match self.inner.find(&key.key_bytes())? {
            Some(bytes) => Ok(Some(V::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Unlink the key's newest entry, re-exposing any value it shadowed.
    /// Returns whether one existed.
    pub fn remove(&self, key: &K) -> Result<bool> {
        self.inner.unlink(&key.key_bytes())
    }

    pub fn sync(&self) -> Result<()> {
        self.inner.sync()
    }
}

/// Key → LIFO row history typed over a codec pair.
#[derive(Debug)]
pub struct HistoryTable<K: KeyEncode + ?Sized, R: RowCodec> {
    inner: RecordMultimap,
    _codec: PhantomData<fn(&K) -> R>,
}

impl<K: KeyEncode + ?Sized, R: RowCodec> HistoryTable<K, R> {
    pub fn create(lookup_path: &Path, rows_path: &Path, bucket_count: u32) -> Result<Self> {
        Ok(HistoryTable {
            inner: RecordMultimap::create(lookup_path, rows_path, bucket_count, R::SIZE as u32)?,
            _codec: PhantomData,
        })
    }

    pub fn start(
        lookup_path: &Path,
        rows_path: &Path,
        bucket_count: u32,
        readonly: bool,
    ) -> Result<Self> {
        Ok(HistoryTable {
            inner: RecordMultimap::start(
                lookup_path,
                rows_path,
                bucket_count,
                R::SIZE as u32,
                readonly,
            )?,
            _codec: PhantomData,
        })
    }

    /// Prepend a row to the key's history.
    pub fn add(&self, key: &K, row: &R) -> Result<()> {
        let encoded = row.encode();
        if encoded.len() != R::SIZE {
            return Err(Error::BadRowSize {
                got: encoded.len(),
                expected: R::SIZE,
            });
        }
        self.inner.add_row(&key.key_bytes(), &encoded)
    }

    /// All rows for a key, most recent first.
    pub fn history(&self, key: &K) -> Result<Vec<R>> {
        self.inner
            .rows(&key.key_bytes())?
            .map(|row| R::decode(&row?))
            .collect()
    }

    /// Undo the most recent `add` for the key. False when there is nothing
    /// left to undo.
    pub fn delete_last(&self, key: &K) -> Result<bool> {
        self.inner.delete_last_row(&key.key_bytes())
    }

    pub fn sync(&self) -> Result<()> {
        self.inner.sync()
    }
}
