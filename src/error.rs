use std::io;
use std::result;

use thiserror::Error;

/// Custom result type for store operations
pub type Result<T> = result::Result<T, Error>;

/// Store error conditions
///
/// Absent keys are not errors anywhere in this crate: lookups return
/// `Ok(None)`. Errors are reserved for I/O failures, format mismatches and
/// structural corruption.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying file or mapping operation failed
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// File is not a chaindb file
    #[error("file is not a valid chaindb file")]
    BadMagic,

    /// On-disk version is incompatible with this build
    #[error("store version mismatch (found {found:#x}, expected {expected:#x})")]
    VersionMismatch { found: u32, expected: u32 },

    /// Persisted bucket count differs from the configured one
    #[error("bucket count mismatch (file has {on_disk}, configured {configured})")]
    BucketCountMismatch { on_disk: u32, configured: u32 },

    /// Persisted row size differs from the configured one
    #[error("row size mismatch (file has {on_disk}, configured {configured})")]
    RowSizeMismatch { on_disk: u32, configured: u32 },

    /// A row payload does not match the table's fixed row size
    #[error("row payload is {got} bytes, table rows are {expected}")]
    BadRowSize { got: usize, expected: usize },

    /// Structural inconsistency; continuing risks silent data loss
    #[error("store is corrupted: {0}")]
    Corrupted(&'static str),

    /// Another process holds the store's exclusive lock
    #[error("store directory is already in use by another process")]
    AlreadyLocked,

    /// `create` found an existing store in the directory
    #[error("a store already exists in this directory")]
    AlreadyExists,

    /// Mutation attempted on a read-only store
    #[error("store is read-only")]
    ReadOnly,

    /// Operation requires a started store
    #[error("store is not started")]
    NotStarted,

    /// `pop` called with no pushed units left
    #[error("nothing to pop: store is empty")]
    Empty,

    /// Pushed unit does not extend the current chain tip
    #[error("unit height {got} does not extend chain at height {expected}")]
    UnexpectedHeight { got: u64, expected: u64 },

    /// A reader kept losing the seqlock race; the writer looks stuck
    #[error("read retried {0} times against an unfinished write")]
    ReadContention(usize),

    /// Malformed bytes while decoding a stored value
    #[error("stored value failed to decode: {0}")]
    Decode(&'static str),
}
