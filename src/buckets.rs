use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::region::RegionView;

/// Fixed-size array of bucket slots at a known region offset.
///
/// Each slot holds either [`EMPTY_SLOT`](crate::constants::EMPTY_SLOT) or the
/// offset of the head of that
/// bucket's collision chain. The count is fixed at creation; the table never
/// rehashes, only its slab area grows.
#[derive(Debug, Clone, Copy)]
pub struct BucketIndex {
    /// Byte offset of slot zero
    offset: u64,
    /// Number of slots
    count: u32,
}

impl BucketIndex {
    pub fn new(offset: u64, count: u32) -> Self {
        debug_assert!(count > 0);
        BucketIndex { offset, count }
    }

    /// Write the empty sentinel into every slot.
    pub fn initialize(&self, view: &RegionView<'_>) -> Result<()> {
        // EMPTY_SLOT is all ones, so a byte fill covers every slot at once.
        view.fill(self.offset, self.size(), 0xff)
    }

    /// Total bytes occupied by the slot array.
    pub fn size(&self) -> u64 {
        self.count as u64 * 8
    }

    /// First byte past the slot array, where the slab/record area begins.
    pub fn end(&self) -> u64 {
        self.offset + self.size()
    }

    /// Map a key to its bucket. xxh3 keeps chains short even for keys that
    /// are themselves hashes with a biased prefix.
    pub fn bucket_of(&self, key: &[u8]) -> u32 {
        (xxh3_64(key) % self.count as u64) as u32
    }

    /// Byte offset of a bucket's slot.
    pub fn slot_offset(&self, bucket: u32) -> u64 {
        debug_assert!(bucket < self.count);
        self.offset + bucket as u64 * 8
    }

    /// Head offset of a bucket's chain, or the empty sentinel.
    pub fn head(&self, view: &RegionView<'_>, bucket: u32) -> Result<u64> {
        view.read_u64(self.slot_offset(bucket))
    }

    /// Replace a bucket's chain head.
    pub fn set_head(&self, view: &RegionView<'_>, bucket: u32, head: u64) -> Result<()> {
        view.write_u64(self.slot_offset(bucket), head)
    }
}
