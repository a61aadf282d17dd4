use bitflags::bitflags;

// Store open flags
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StoreFlags: u32 {
        /// Map the files read-only; every mutating call fails with `ReadOnly`.
        const READONLY = 0x01;
        /// Skip the implicit flush on `stop`/`close`.
        const NOSYNC = 0x02;
    }
}

/// Magic number identifying chaindb files
///
/// Reads as "CHDB" in a little-endian hex dump.
pub const STORE_MAGIC: u32 = 0x4244_4843;

/// Version numbers major
pub const VERSION_MAJOR: u32 = 1;
/// Version numbers minor
pub const VERSION_MINOR: u32 = 0;
/// Version numbers patch
pub const VERSION_PATCH: u32 = 0;

/// Packed on-disk version
pub const STORE_VERSION: u32 = VERSION_MAJOR << 16 | VERSION_MINOR << 8 | VERSION_PATCH;

/// Empty sentinel for slab offsets. Offset zero addresses the file header,
/// so zero cannot double as "no entry".
pub const EMPTY_SLOT: u64 = u64::MAX;

/// Empty sentinel for record indices.
pub const EMPTY_ROW: u32 = u32::MAX;

/// Fixed header of every table file:
/// `[magic u32][version u32][param u32][reserved u32][cursor u64]`.
/// `param` is the bucket count for lookup files and the row size for rows
/// files; `cursor` is the allocation cursor (byte offset or record count).
pub const FILE_HEADER_SIZE: u64 = 24;

/// Byte offset of the allocation cursor inside the file header.
pub const CURSOR_OFFSET: u64 = 16;

/// Per-slab overhead: `[next u64][key_len u32][value_len u32]`.
pub const SLAB_HEADER_SIZE: u64 = 16;

/// Per-record overhead: `[next u32]`.
pub const RECORD_LINK_SIZE: u64 = 4;

/// Smallest increment a region grows by. Growth doubles the mapped length
/// until the allocation fits, with this floor.
pub const GROW_CHUNK: u64 = 64 * 1024;

/// Bound on seqlock read retries before giving up with `ReadContention`.
pub const MAX_READ_RETRIES: usize = 64;

/// Default bucket counts, sized for mainnet-scale chains. Histories get the
/// widest table since addresses outnumber blocks by orders of magnitude.
pub const DEFAULT_BLOCK_BUCKETS: u32 = 650_000;
pub const DEFAULT_SPEND_BUCKETS: u32 = 2_000_000;
pub const DEFAULT_HISTORY_BUCKETS: u32 = 4_000_000;
pub const DEFAULT_AUX_BUCKETS: u32 = 100_000;
pub const DEFAULT_WALLET_BUCKETS: u32 = 10_000;
pub const DEFAULT_UNIT_BUCKETS: u32 = 650_000;
