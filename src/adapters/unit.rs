use crate::adapters::auxiliary::{CandidateRow, CertificateEntry, IdentifierEntry};
use crate::adapters::blocks::BlockHash;
use crate::adapters::history::{HistoryRow, PaymentKey};
use crate::adapters::spends::ChainPoint;
use crate::adapters::{put_slice, ByteReader};
use crate::error::{Error, Result};
use crate::table::{RowCodec, ValueCodec};

/// Everything one block contributes to the indices: the logical unit of
/// `push`/`pop`.
///
/// A push applies each collection in order under one writer bracket; a pop
/// reverses them back-to-front through the LIFO delete paths, so applying a
/// unit and popping it leaves the store content-equal to its prior state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainUnit {
    /// Height this unit extends the chain to (first unit is height 0)
    pub height: u64,
    pub hash: BlockHash,
    /// Raw header bytes, stored unparsed
    pub header: Vec<u8>,
    /// Outpoint spent → inpoint spending it
    pub spends: Vec<(ChainPoint, ChainPoint)>,
    /// Address short-hash → history row
    pub payments: Vec<(PaymentKey, HistoryRow)>,
    /// Registered identifier symbol → entry
    pub identifiers: Vec<(String, IdentifierEntry)>,
    /// Certificate symbol → entry
    pub certificates: Vec<(String, CertificateEntry)>,
    /// Candidate symbol → state row
    pub candidates: Vec<(String, CandidateRow)>,
}

impl ChainUnit {
    /// Journal encoding, stored under the unit's height so `pop` can undo
    /// insertions without re-deriving them from the domain tables.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.hash);
        put_slice(&mut out, &self.header);

        out.extend_from_slice(&(self.spends.len() as u32).to_le_bytes());
        for (outpoint, inpoint) in &self.spends {
            out.extend_from_slice(&outpoint.to_bytes());
            out.extend_from_slice(&inpoint.to_bytes());
        }

        out.extend_from_slice(&(self.payments.len() as u32).to_le_bytes());
        for (key, row) in &self.payments {
            out.extend_from_slice(key);
            out.extend_from_slice(&row.encode());
        }

        out.extend_from_slice(&(self.identifiers.len() as u32).to_le_bytes());
        for (symbol, entry) in &self.identifiers {
            put_slice(&mut out, symbol.as_bytes());
            put_slice(&mut out, &entry.encode());
        }

        out.extend_from_slice(&(self.certificates.len() as u32).to_le_bytes());
        for (symbol, entry) in &self.certificates {
            put_slice(&mut out, symbol.as_bytes());
            put_slice(&mut out, &entry.encode());
        }

        out.extend_from_slice(&(self.candidates.len() as u32).to_le_bytes());
        for (symbol, row) in &self.candidates {
            put_slice(&mut out, symbol.as_bytes());
            out.extend_from_slice(&row.encode());
        }

        out
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let height = reader.u64()?;
        let hash: BlockHash = reader.take(32)?.try_into().expect("32 bytes");
        let header = reader.slice()?.to_vec();

        let mut spends = Vec::new();
        for _ in 0..reader.u32()? {
            let outpoint = ChainPoint::read(&mut reader)?;
            let inpoint = ChainPoint::read(&mut reader)?;
            spends.push((outpoint, inpoint));
        }

        let mut payments = Vec::new();
        for _ in 0..reader.u32()? {
            let key: PaymentKey = reader.take(20)?.try_into().expect("20 bytes");
            let row = HistoryRow::decode(reader.take(HistoryRow::SIZE)?)?;
            payments.push((key, row));
        }

        let mut identifiers = Vec::new();
        for _ in 0..reader.u32()? {
            let symbol = reader.string()?;
            let entry = IdentifierEntry::decode(reader.slice()?)?;
            identifiers.push((symbol, entry));
        }

        let mut certificates = Vec::new();
        for _ in 0..reader.u32()? {
            let symbol = reader.string()?;
            let entry = CertificateEntry::decode(reader.slice()?)?;
            certificates.push((symbol, entry));
        }

        let mut candidates = Vec::new();
        for _ in 0..reader.u32()? {
            let symbol = reader.string()?;
            let row = CandidateRow::decode(reader.take(CandidateRow::SIZE)?)?;
            candidates.push((symbol, row));
        }

        reader.expect_end().map_err(|_| Error::Decode("oversized unit"))?;

        Ok(ChainUnit {
            height,
            hash,
            header,
            spends,
            payments,
            identifiers,
            certificates,
            candidates,
        })
    }
}
