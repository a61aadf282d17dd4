//! Thin domain façades over the generic blob/history tables.
//!
//! Each adapter translates one entity's keys and values to bytes and
//! delegates to a [`BlobTable`](crate::table::BlobTable) or
//! [`HistoryTable`](crate::table::HistoryTable); none of them re-implement
//! bucket or slab wiring.

mod auxiliary;
mod blocks;
mod history;
mod spends;
mod unit;

pub use auxiliary::{
    CandidateRow, CandidateStore, CertificateEntry, CertificateStore, IdentifierEntry,
    IdentifierStore, WalletStore,
};
pub use blocks::{BlockEntry, BlockHash, BlockStore};
pub use history::{HistoryRow, HistoryRowKind, HistoryStore, PaymentKey};
pub use spends::{ChainPoint, SpendStore};
pub use unit::ChainUnit;

use crate::error::{Error, Result};

/// Append a length-prefixed byte run.
pub(crate) fn put_slice(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Sequential reader over an encoded value, all fields little-endian.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::Decode("value truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    /// A length-prefixed byte run written by [`put_slice`].
    pub fn slice(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String> {
        String::from_utf8(self.slice()?.to_vec()).map_err(|_| Error::Decode("invalid utf-8"))
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    /// Fails when trailing bytes remain after a fixed-layout decode.
    pub fn expect_end(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(Error::Decode("trailing bytes"))
        }
    }
}
