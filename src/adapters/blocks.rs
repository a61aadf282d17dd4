use std::path::Path;

use crate::adapters::ByteReader;
use crate::error::Result;
use crate::table::{BlobTable, ValueCodec};

/// Double-SHA256 block identifier.
pub type BlockHash = [u8; 32];

/// Stored state of one block header: its chain height plus the raw header
/// bytes exactly as received. The engine never parses the header; validation
/// owns that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub height: u64,
    pub header: Vec<u8>,
}

impl ValueCodec for BlockEntry {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.header.len());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.header);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let height = reader.u64()?;
        let header = reader.rest().to_vec();
        Ok(BlockEntry { height, header })
    }
}

/// Block hash → header entry.
#[derive(Debug)]
pub struct BlockStore {
    table: BlobTable<BlockHash, BlockEntry>,
}

impl BlockStore {
    const FILE: &'static str = "block_table";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(BlockStore {
            table: BlobTable::create(&dir.join(Self::FILE), bucket_count)?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(BlockStore {
            table: BlobTable::start(&dir.join(Self::FILE), bucket_count, readonly)?,
        })
    }

    /// Shadows any previous entry for the hash; `remove` re-exposes it.
    pub fn store(&self, hash: &BlockHash, entry: &BlockEntry) -> Result<()> {
        self.table.insert(hash, entry)
    }

    pub fn get(&self, hash: &BlockHash) -> Result<Option<BlockEntry>> {
        self.table.get(hash)
    }

    pub fn remove(&self, hash: &BlockHash) -> Result<bool> {
        self.table.remove(hash)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}
