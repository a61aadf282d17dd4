//! Secondary indices beyond the chain core: registered identifiers, issued
//! certificates, candidate state histories and wallet metadata. Each is the
//! same thin delegation pattern as the block/spend/history stores.

use std::path::Path;

use crate::adapters::spends::ChainPoint;
use crate::adapters::{put_slice, ByteReader};
use crate::error::Result;
use crate::table::{BlobTable, HistoryTable, RowCodec, ValueCodec};

/// On-chain registered identifier: symbol → owning address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierEntry {
    /// Short hash of the owning address
    pub address: [u8; 20],
    /// Height of the registering block
    pub height: u64,
}

impl ValueCodec for IdentifierEntry {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(28);
        out.extend_from_slice(&self.address);
        out.extend_from_slice(&self.height.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let address: [u8; 20] = reader.take(20)?.try_into().expect("20 bytes");
        let height = reader.u64()?;
        reader.expect_end()?;
        Ok(IdentifierEntry { address, height })
    }
}

/// Issued certificate: symbol → owner plus opaque certificate body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    pub owner: String,
    pub height: u64,
    pub payload: Vec<u8>,
}

impl ValueCodec for CertificateEntry {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_slice(&mut out, self.owner.as_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        put_slice(&mut out, &self.payload);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let owner = reader.string()?;
        let height = reader.u64()?;
        let payload = reader.slice()?.to_vec();
        reader.expect_end()?;
        Ok(CertificateEntry {
            owner,
            height,
            payload,
        })
    }
}

/// One state transition of a candidate, kept as a history so a reorg can
/// roll the candidate back to its previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRow {
    /// Output that carried the transition
    pub point: ChainPoint,
    pub height: u64,
    /// Domain-defined status byte (registered, transferred, ...)
    pub status: u8,
}

impl RowCodec for CandidateRow {
    const SIZE: usize = ChainPoint::SIZE + 8 + 1;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.point.to_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.status);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let point = ChainPoint::read(&mut reader)?;
        let height = reader.u64()?;
        let status = reader.u8()?;
        reader.expect_end()?;
        Ok(CandidateRow {
            point,
            height,
            status,
        })
    }
}

/// Registered identifier symbol → entry.
#[derive(Debug)]
pub struct IdentifierStore {
    table: BlobTable<str, IdentifierEntry>,
}

impl IdentifierStore {
    const FILE: &'static str = "identifier_table";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(IdentifierStore {
            table: BlobTable::create(&dir.join(Self::FILE), bucket_count)?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(IdentifierStore {
            table: BlobTable::start(&dir.join(Self::FILE), bucket_count, readonly)?,
        })
    }

    /// Shadows any previous registration of the symbol (an ownership
    /// transfer); `remove` re-exposes it, which is what lets a reorg roll
    /// the transfer back.
    pub fn store(&self, symbol: &str, entry: &IdentifierEntry) -> Result<()> {
        self.table.insert(symbol, entry)
    }

    pub fn get(&self, symbol: &str) -> Result<Option<IdentifierEntry>> {
        self.table.get(symbol)
    }

    pub fn remove(&self, symbol: &str) -> Result<bool> {
        self.table.remove(symbol)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}

/// Certificate symbol → entry.
#[derive(Debug)]
pub struct CertificateStore {
    table: BlobTable<str, CertificateEntry>,
}

impl CertificateStore {
    const FILE: &'static str = "certificate_table";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(CertificateStore {
            table: BlobTable::create(&dir.join(Self::FILE), bucket_count)?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(CertificateStore {
            table: BlobTable::start(&dir.join(Self::FILE), bucket_count, readonly)?,
        })
    }

    /// Shadows any previous certificate for the symbol; `remove` re-exposes
    /// it.
    pub fn store(&self, symbol: &str, entry: &CertificateEntry) -> Result<()> {
        self.table.insert(symbol, entry)
    }

    pub fn get(&self, symbol: &str) -> Result<Option<CertificateEntry>> {
        self.table.get(symbol)
    }

    pub fn remove(&self, symbol: &str) -> Result<bool> {
        self.table.remove(symbol)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}

/// Candidate symbol → LIFO state history.
#[derive(Debug)]
pub struct CandidateStore {
    table: HistoryTable<str, CandidateRow>,
}

impl CandidateStore {
    const LOOKUP_FILE: &'static str = "candidate_table";
    const ROWS_FILE: &'static str = "candidate_rows";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(CandidateStore {
            table: HistoryTable::create(
                &dir.join(Self::LOOKUP_FILE),
                &dir.join(Self::ROWS_FILE),
                bucket_count,
            )?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(CandidateStore {
            table: HistoryTable::start(
                &dir.join(Self::LOOKUP_FILE),
                &dir.join(Self::ROWS_FILE),
                bucket_count,
                readonly,
            )?,
        })
    }

    pub fn add(&self, symbol: &str, row: &CandidateRow) -> Result<()> {
        self.table.add(symbol, row)
    }

    pub fn get(&self, symbol: &str) -> Result<Vec<CandidateRow>> {
        self.table.history(symbol)
    }

    pub fn delete_last(&self, symbol: &str) -> Result<bool> {
        self.table.delete_last(symbol)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}

/// Wallet metadata rows: name → opaque (typically encrypted) payload.
///
/// Wallet rows are driven by the user, not by block application, so this
/// store takes no part in `push`/`pop`.
#[derive(Debug)]
pub struct WalletStore {
    table: BlobTable<str, Vec<u8>>,
}

impl WalletStore {
    const FILE: &'static str = "wallet_table";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(WalletStore {
            table: BlobTable::create(&dir.join(Self::FILE), bucket_count)?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(WalletStore {
            table: BlobTable::start(&dir.join(Self::FILE), bucket_count, readonly)?,
        })
    }

    pub fn store(&self, name: &str, payload: &[u8]) -> Result<()> {
        self.table.store(name, &payload.to_vec())
    }

    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.table.get(name)
    }

    pub fn remove(&self, name: &str) -> Result<bool> {
        self.table.remove(name)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}
