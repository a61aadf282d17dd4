use std::path::Path;

use crate::adapters::spends::ChainPoint;
use crate::adapters::ByteReader;
use crate::error::{Error, Result};
use crate::table::{HistoryTable, RowCodec};

/// Short hash of a payment address (RIPEMD-160 output width).
pub type PaymentKey = [u8; 20];

/// Whether a history row credits or debits the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRowKind {
    /// An output paying the address
    Output = 0,
    /// A spend of one of the address's outputs
    Spend = 1,
}

/// One event in an address's history.
///
/// For `Output` rows `value` is the amount received; for `Spend` rows it is
/// a checksum of the spent outpoint, letting wallet code pair spends with
/// their outputs without a second index. That asymmetry belongs to callers;
/// the engine only round-trips the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRow {
    pub kind: HistoryRowKind,
    pub point: ChainPoint,
    pub height: u64,
    pub value: u64,
}

impl RowCodec for HistoryRow {
    const SIZE: usize = 1 + ChainPoint::SIZE + 8 + 8;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.push(self.kind as u8);
        out.extend_from_slice(&self.point.to_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let kind = match reader.u8()? {
            0 => HistoryRowKind::Output,
            1 => HistoryRowKind::Spend,
            _ => return Err(Error::Decode("unknown history row kind")),
        };
        let point = ChainPoint::read(&mut reader)?;
        let height = reader.u64()?;
        let value = reader.u64()?;
        reader.expect_end()?;
        Ok(HistoryRow {
            kind,
            point,
            height,
            value,
        })
    }
}

/// Address → LIFO list of history rows; the reorg-reversible index.
#[derive(Debug)]
pub struct HistoryStore {
    table: HistoryTable<PaymentKey, HistoryRow>,
}

impl HistoryStore {
    const LOOKUP_FILE: &'static str = "history_table";
    const ROWS_FILE: &'static str = "history_rows";

    pub fn create(dir: &Path, bucket_count: u32) -> Result<Self> {
        Ok(HistoryStore {
            table: HistoryTable::create(
                &dir.join(Self::LOOKUP_FILE),
                &dir.join(Self::ROWS_FILE),
                bucket_count,
            )?,
        })
    }

    pub fn start(dir: &Path, bucket_count: u32, readonly: bool) -> Result<Self> {
        Ok(HistoryStore {
            table: HistoryTable::start(
                &dir.join(Self::LOOKUP_FILE),
                &dir.join(Self::ROWS_FILE),
                bucket_count,
                readonly,
            )?,
        })
    }

    pub fn add(&self, key: &PaymentKey, row: &HistoryRow) -> Result<()> {
        self.table.add(key, row)
    }

    /// All rows for an address, most recent first.
    pub fn get(&self, key: &PaymentKey) -> Result<Vec<HistoryRow>> {
        self.table.history(key)
    }

    pub fn delete_last(&self, key: &PaymentKey) -> Result<bool> {
        self.table.delete_last(key)
    }

    pub fn sync(&self) -> Result<()> {
        self.table.sync()
    }
}
