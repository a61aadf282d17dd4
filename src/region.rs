use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::ptr;

use log::debug;
use memmap2::{MmapMut, MmapOptions};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::constants::GROW_CHUNK;
use crate::error::{Error, Result};

/// One open, growable file mapped into the process address space.
///
/// Higher layers address data exclusively by byte offset into the region and
/// re-resolve every offset through a fresh [`RegionView`]; raw pointers are
/// never held across an operation boundary because [`resize`] replaces the
/// mapping. The inner `RwLock` is the remap lock: ordinary reads and writes
/// share it, a grow takes it exclusively so no view is live across the remap.
///
/// The file is always mapped writable, even for read-only stores; mutation is
/// gated at the [`RegionView`] API instead, which keeps a single mapping type
/// throughout.
///
/// [`resize`]: MappedRegion::resize
#[derive(Debug)]
pub struct MappedRegion {
    /// Path, kept for log messages
    path: PathBuf,
    /// Backing file
    file: File,
    /// Current memory map, swapped out on grow
    map: RwLock<MmapMut>,
    /// Mutations refused when set
    readonly: bool,
}

impl MappedRegion {
    /// Create the backing file with an initial length and map it.
    ///
    /// Fails with `AlreadyExists` if the file is present, so a half-created
    /// store is never silently reused.
    pub fn create(path: &Path, initial_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::AlreadyExists
                } else {
                    Error::Io(err)
                }
            })?;
        file.set_len(initial_len.max(GROW_CHUNK))?;

        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(MappedRegion {
            path: path.to_path_buf(),
            file,
            map: RwLock::new(map),
            readonly: false,
        })
    }

    /// Map an existing file at its current length.
    pub fn open(path: &Path, readonly: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Error::Corrupted("region file is empty"));
        }

        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(MappedRegion {
            path: path.to_path_buf(),
            file,
            map: RwLock::new(map),
            readonly,
        })
    }

    /// Current mapped length in bytes.
    pub fn len(&self) -> u64 {
        self.map.read().len() as u64
    }

    /// Take a read view of the current mapping.
    ///
    /// The view holds the remap lock shared, so a concurrent grow waits until
    /// the view is dropped. Offsets resolved through one view must not be
    /// dereferenced through another.
    pub fn view(&self) -> RegionView<'_> {
        RegionView {
            guard: self.map.read(),
            readonly: self.readonly,
        }
    }

    /// Extend the backing file to `new_len` and remap.
    ///
    /// Growth is strictly monotonic; a request at or below the current length
    /// is a no-op. Existing byte offsets stay valid, any pointer derived from
    /// the previous mapping does not. Insufficient disk space surfaces here
    /// as `Error::Io` and aborts the enclosing write.
    pub fn resize(&self, new_len: u64) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly);
        }

        let mut guard = self.map.write();
        if new_len <= guard.len() as u64 {
            return Ok(());
        }

        guard.flush()?;
        self.file.set_len(new_len)?;
        *guard = unsafe { MmapOptions::new().map_mut(&self.file)? };
        debug!("region {} grown to {} bytes", self.path.display(), new_len);
        Ok(())
    }

    /// Flush mapped bytes back to the file.
    pub fn flush(&self) -> Result<()> {
        self.map.read().flush()?;
        Ok(())
    }
}

/// A read guard over the current mapping, resolving offsets to bytes.
///
/// All accesses are bounds-checked against the mapped length. Writes go
/// through a raw pointer obtained from the shared mapping: the store has a
/// single logical writer and readers validate against the sequence lock, so
/// a torn read is detected and retried rather than prevented.
pub struct RegionView<'a> {
    guard: RwLockReadGuard<'a, MmapMut>,
    readonly: bool,
}

impl RegionView<'_> {
    /// Mapped length visible through this view.
    pub fn len(&self) -> u64 {
        self.guard.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.guard.len() == 0
    }

    fn check(&self, offset: u64, len: u64) -> Result<usize> {
        let end = offset.checked_add(len).ok_or(Error::Corrupted("offset overflow"))?;
        if end > self.len() {
            return Err(Error::Corrupted("offset past mapped length"));
        }
        Ok(offset as usize)
    }

    /// Borrow `len` bytes at `offset`.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let start = self.check(offset, len as u64)?;
        Ok(&self.guard[start..start + len])
    }

    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        let bytes = self.slice(offset, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    /// Write `bytes` at `offset` through the shared mapping.
    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly);
        }
        let start = self.check(offset, bytes.len() as u64)?;

        // SAFETY: in bounds per the check above; the single-writer discipline
        // means no concurrent writer, and concurrent readers detect torn
        // values through the sequence lock and retry.
        unsafe {
            let dst = self.guard.as_ptr().add(start) as *mut u8;
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(())
    }

    pub fn write_u32(&self, offset: u64, value: u32) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    pub fn write_u64(&self, offset: u64, value: u64) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Fill `len` bytes at `offset` with `byte`.
    pub fn fill(&self, offset: u64, len: u64, byte: u8) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly);
        }
        let start = self.check(offset, len)?;

        // SAFETY: same invariants as `write`.
        unsafe {
            let dst = self.guard.as_ptr().add(start) as *mut u8;
            ptr::write_bytes(dst, byte, len as usize);
        }
        Ok(())
    }
}
