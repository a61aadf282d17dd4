use std::path::Path;

use crate::adapters::ByteReader;
use crate::error::Result;
use crate::table::{BlobTable, KeyEncode, ValueCodec};

/// A transaction hash plus output/input position, 36 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPoint {
    pub hash: [u8; 32],
    pub index: u32,
}

impl ChainPoint {
    pub const SIZE: usize = 36;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..32].copy_from_slice(&self.hash);
        out[32..].copy_from_slice(&self.index.to_le_bytes());
        out
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let hash: [u8; 32] = reader.take(32)?.try_into().expect("32 bytes");
        let index = reader.u32()?;
        Ok(ChainPoint { hash, index })
    }
}

impl KeyEncode for ChainPoint {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

impl ValueCodec for ChainPoint {
    fn encode(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let point = Self::read(&mut reader)?;
        reader.expect_end()?;
        Ok(point)
    }
}

/// Spent output → the input that spent it.
///
/// Keys are outpoints, values inpoints; a removed spend (reorg rollback)
/// makes the output unspent again as far as this index is concerned.
#[derive(Debug)]
pub struct SpendStore {
    table: BlobTable<ChainPoint, ChainPoint>,
}

impl SpendStore {
    const FILE: &'static str = "spend_table";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(SpendStore {
            table: BlobTable::create(&dir.join(Self::FILE), bucket_count)?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(SpendStore {
            table: BlobTable::start(&dir.join(Self::FILE), bucket_count, readonly)?,
        })
    }

    /// Shadows any previous entry for the outpoint; `remove` re-exposes it.
    pub fn store(&self, outpoint: &ChainPoint, inpoint: &ChainPoint) -> Result<()> {
        self.table.insert(outpoint, inpoint)
    }

    pub fn get(&self, outpoint: &ChainPoint) -> Result<Option<ChainPoint>> {
        self.table.get(outpoint)
    }

    pub fn remove(&self, outpoint: &ChainPoint) -> Result<bool> {
        self.table.remove(outpoint)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}
