//! chaindb — memory-mapped index engine for a blockchain full node.
//!
//! Two reusable primitives back every index: a hash-indexed blob store
//! ([`SlabTable`]) and a hash-indexed multimap of fixed-size rows
//! ([`RecordMultimap`]), both living directly inside growable memory-mapped
//! files. One writer and many readers coexist through a store-wide
//! [`SequenceLock`]; readers never block and retry torn reads instead.
//! [`Database`] wires the typed domain adapters together and adds the
//! `push`/`pop` unit-of-work surface used for block application and
//! reorganization rollback.

mod adapters;
mod buckets;
mod constants;
mod database;
mod error;
mod multimap;
mod records;
mod region;
mod seqlock;
mod slab;
mod table;

pub use adapters::{
    BlockEntry, BlockHash, BlockStore, CandidateRow, CandidateStore, CertificateEntry,
    CertificateStore, ChainPoint, ChainUnit, HistoryRow, HistoryRowKind, HistoryStore,
    IdentifierEntry, IdentifierStore, PaymentKey, SpendStore, WalletStore,
};
pub use constants::{StoreFlags, STORE_VERSION, VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH};
pub use database::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use multimap::{RecordMultimap, RowIter};
pub use records::RecordStore;
pub use region::{MappedRegion, RegionView};
pub use seqlock::{ReadHandle, SequenceLock};
pub use slab::SlabTable;
pub use table::{BlobTable, HistoryTable, KeyEncode, RowCodec, ValueCodec};
