use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use fs2::FileExt;
use log::{debug, info, warn};

use crate::adapters::{
    BlockEntry, BlockHash, BlockStore, CandidateRow, CandidateStore, CertificateEntry,
    CertificateStore, ChainPoint, ChainUnit, HistoryRow, HistoryStore, IdentifierEntry,
    IdentifierStore, PaymentKey, SpendStore, WalletStore,
};
use crate::constants::{
    StoreFlags, DEFAULT_AUX_BUCKETS, DEFAULT_BLOCK_BUCKETS, DEFAULT_HISTORY_BUCKETS,
    DEFAULT_SPEND_BUCKETS, DEFAULT_UNIT_BUCKETS, DEFAULT_WALLET_BUCKETS, MAX_READ_RETRIES,
    STORE_MAGIC, STORE_VERSION, VERSION_MAJOR,
};
use crate::error::{Error, Result};
use crate::seqlock::{ReadHandle, SequenceLock};
use crate::slab::SlabTable;

const METADATA_FILE: &str = "metadata";
const LOCK_FILE: &str = "lock";

/// Tunables fixed at database creation. Bucket counts are immutable for the
/// life of the store; only the slab/record areas grow.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub directory: PathBuf,
    pub flags: StoreFlags,
    pub block_buckets: u32,
    pub spend_buckets: u32,
    pub history_buckets: u32,
    pub identifier_buckets: u32,
    pub certificate_buckets: u32,
    pub candidate_buckets: u32,
    pub wallet_buckets: u32,
    pub unit_buckets: u32,
}

impl DatabaseConfig {
    /// Defaults sized for a mainnet chain.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        DatabaseConfig {
            directory: directory.into(),
            flags: StoreFlags::empty(),
            block_buckets: DEFAULT_BLOCK_BUCKETS,
            spend_buckets: DEFAULT_SPEND_BUCKETS,
            history_buckets: DEFAULT_HISTORY_BUCKETS,
            identifier_buckets: DEFAULT_AUX_BUCKETS,
            certificate_buckets: DEFAULT_AUX_BUCKETS,
            candidate_buckets: DEFAULT_AUX_BUCKETS,
            wallet_buckets: DEFAULT_WALLET_BUCKETS,
            unit_buckets: DEFAULT_UNIT_BUCKETS,
        }
    }
}

/// Adapter lifecycle, in order. `close` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Created,
    Started,
    Stopped,
    Closed,
}

/// Every table composing one logical database.
#[derive(Debug)]
struct Tables {
    blocks: BlockStore,
    spends: SpendStore,
    history: HistoryStore,
    identifiers: IdentifierStore,
    certificates: CertificateStore,
    candidates: CandidateStore,
    wallets: WalletStore,
    /// Journal of pushed units keyed by height, consumed by `pop`
    units: SlabTable,
}

impl Tables {
    fn create(config: &DatabaseConfig) -> Result<Self> {
        let dir = &config.directory;
        Ok(Tables {
            blocks: BlockStore::create(dir, config.block_buckets)?,
            spends: SpendStore::create(dir, config.spend_buckets)?,
            history: HistoryStore::create(dir, config.history_buckets)?,
            identifiers: IdentifierStore::create(dir, config.identifier_buckets)?,
            certificates: CertificateStore::create(dir, config.certificate_buckets)?,
            candidates: CandidateStore::create(dir, config.candidate_buckets)?,
            wallets: WalletStore::create(dir, config.wallet_buckets)?,
            units: SlabTable::create(&dir.join("unit_table"), config.unit_buckets)?,
        })
    }

    fn start(config: &DatabaseConfig) -> Result<Self> {
        let dir = &config.directory;
        let readonly = config.flags.contains(StoreFlags::READONLY);
        Ok(Tables {
            blocks: BlockStore::start(dir, config.block_buckets, readonly)?,
            spends: SpendStore::start(dir, config.spend_buckets, readonly)?,
            history: HistoryStore::start(dir, config.history_buckets, readonly)?,
            identifiers: IdentifierStore::start(dir, config.identifier_buckets, readonly)?,
            certificates: CertificateStore::start(dir, config.certificate_buckets, readonly)?,
            candidates: CandidateStore::start(dir, config.candidate_buckets, readonly)?,
            wallets: WalletStore::start(dir, config.wallet_buckets, readonly)?,
            units: SlabTable::start(&dir.join("unit_table"), config.unit_buckets, readonly)?,
        })
    }

    fn sync(&self) -> Result<()> {
        self.blocks.sync()?;
        self.spends.sync()?;
        self.history.sync()?;
        self.identifiers.sync()?;
        self.certificates.sync()?;
        self.candidates.sync()?;
        self.wallets.sync()?;
        self.units.sync()
    }
}

/// One logical database: all index tables, the shared sequence lock and the
/// chain-unit journal backing `push`/`pop`.
///
/// ```no_run
/// # use chaindb::{Database, DatabaseConfig};
/// # fn main() -> chaindb::Result<()> {
/// let mut db = Database::new(DatabaseConfig::new("/var/lib/chaindb"));
/// db.create()?;
/// db.start()?;
/// // ... push units, serve reads ...
/// db.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    state: State,
    /// Generation counter shared by reference with every read/write path
    lock: Arc<SequenceLock>,
    /// Held open for the process-exclusive flock
    dir_lock: Option<File>,
    tables: Option<Tables>,
    /// Number of pushed units; the chain tip is `height - 1`
    height: AtomicU64,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Database {
            config,
            state: State::Uninitialized,
            lock: Arc::new(SequenceLock::new()),
            dir_lock: None,
            tables: None,
            height: AtomicU64::new(0),
        }
    }

    /// Initialize an empty on-disk layout: every table file plus the
    /// store-wide metadata file. Valid only before any other lifecycle call,
    /// and refuses a directory that already holds a store.
    pub fn create(&mut self) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(Error::Corrupted("create on a non-fresh database"));
        }
        fs::create_dir_all(&self.config.directory)?;
        if self.config.directory.join(METADATA_FILE).exists() {
            return Err(Error::AlreadyExists);
        }

        // Tables are created then dropped: `created` means files on disk,
        // `start` maps them.
        Tables::create(&self.config)?;
        write_metadata(&self.config.directory, 0)?;

        info!("created store in {}", self.config.directory.display());
        self.state = State::Created;
        Ok(())
    }

    /// Map every table and make the database ready for reads and writes.
    ///
    /// Acquires the process-exclusive lock first: a second process opening
    /// the same directory fails with `AlreadyLocked` before touching any
    /// table. Version policy: a different major is fatal, an older minor is
    /// upgraded in place.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::Uninitialized | State::Created | State::Stopped => {}
            State::Started => return Err(Error::Corrupted("start on a started database")),
            State::Closed => return Err(Error::Corrupted("start on a closed database")),
        }

        let dir = &self.config.directory;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| Error::AlreadyLocked)?;

        let height = match read_metadata(dir) {
            Ok((version, height)) => {
                if version >> 16 != VERSION_MAJOR {
                    return Err(Error::VersionMismatch {
                        found: version,
                        expected: STORE_VERSION,
                    });
                }
                if version < STORE_VERSION {
                    info!("upgrading store metadata from {version:#x} to {STORE_VERSION:#x}");
                    write_metadata(dir, height)?;
                } else if version > STORE_VERSION {
                    return Err(Error::VersionMismatch {
                        found: version,
                        expected: STORE_VERSION,
                    });
                }
                height
            }
            Err(err) => {
                let _ = FileExt::unlock(&lock_file);
                return Err(err);
            }
        };

        match Tables::start(&self.config) {
            Ok(tables) => {
                self.tables = Some(tables);
                self.dir_lock = Some(lock_file);
                self.height.store(height, Ordering::Release);
                self.state = State::Started;
                info!("started store in {} at height {height}", dir.display());
                Ok(())
            }
            Err(err) => {
                let _ = FileExt::unlock(&lock_file);
                Err(err)
            }
        }
    }

    /// Unmap all tables, flush unless `NOSYNC`, release the process lock.
    /// The database can be started again afterwards.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != State::Started {
            return Err(Error::NotStarted);
        }

        if !self
            .config
            .flags
            .intersects(StoreFlags::READONLY | StoreFlags::NOSYNC)
        {
            self.sync()?;
        }
        self.tables = None;
        if let Some(lock_file) = self.dir_lock.take() {
            let _ = FileExt::unlock(&lock_file);
        }
        self.state = State::Stopped;
        info!("stopped store in {}", self.config.directory.display());
        Ok(())
    }

    /// Terminal close; safe to call from any state and from `Drop`.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Started {
            self.stop()?;
        }
        self.state = State::Closed;
        Ok(())
    }

    /// Persist every allocation cursor and the chain height.
    pub fn sync(&self) -> Result<()> {
        let tables = self.tables()?;
        tables.sync()?;
        write_metadata(&self.config.directory, self.height.load(Ordering::Acquire))
    }

    /// Number of pushed units; the tip is at `height() - 1`.
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    // ---- concurrency hooks -------------------------------------------------

    pub fn begin_read(&self) -> ReadHandle {
        self.lock.begin_read()
    }

    pub fn is_read_valid(&self, handle: ReadHandle) -> bool {
        self.lock.is_read_valid(handle)
    }

    /// Bracketing a write is a counter bump that cannot fail, so these
    /// return `()` rather than a success flag.
    pub fn begin_write(&self) {
        self.lock.begin_write()
    }

    pub fn end_write(&self) {
        self.lock.end_write()
    }

    fn tables(&self) -> Result<&Tables> {
        self.tables.as_ref().ok_or(Error::NotStarted)
    }

    /// Run one logical mutation under a writer bracket. `end_write` fires
    /// even when the mutation fails, so readers are never wedged behind an
    /// odd counter.
    fn with_write<T>(&self, f: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        if self.config.flags.contains(StoreFlags::READONLY) {
            return Err(Error::ReadOnly);
        }
        let tables = self.tables()?;

        self.lock.begin_write();
        let result = f(tables);
        self.lock.end_write();
        result
    }

    /// Run one read under a sample/validate pair, retrying torn reads.
    ///
    /// An error result is only surfaced once the handle validates: a failure
    /// produced by reading concurrently with a write is indistinguishable
    /// from corruption until the read is known consistent.
    fn with_read<T>(&self, f: impl Fn(&Tables) -> Result<T>) -> Result<T> {
        let tables = self.tables()?;

        for _ in 0..MAX_READ_RETRIES {
            let handle = self.lock.begin_read();
            let result = f(tables);
            if self.lock.is_read_valid(handle) {
                return result;
            }
            thread::yield_now();
        }
        warn!("read contended {MAX_READ_RETRIES} times; writer appears stuck");
        Err(Error::ReadContention(MAX_READ_RETRIES))
    }

    // ---- push / pop --------------------------------------------------------

    /// Apply all index updates for one logical unit under a single writer
    /// bracket, journal the unit, and advance the chain height.
    pub fn push(&self, unit: &ChainUnit) -> Result<()> {
        let height = self.height.load(Ordering::Acquire);
        if unit.height != height {
            return Err(Error::UnexpectedHeight {
                got: unit.height,
                expected: height,
            });
        }

        self.with_write(|tables| {
            tables.blocks.store(
                &unit.hash,
                &BlockEntry {
                    height: unit.height,
                    header: unit.header.clone(),
                },
            )?;
            for (outpoint, inpoint) in &unit.spends {
                tables.spends.store(outpoint, inpoint)?;
            }
            for (key, row) in &unit.payments {
                tables.history.add(key, row)?;
            }
            for (symbol, entry) in &unit.identifiers {
                tables.identifiers.store(symbol, entry)?;
            }
            for (symbol, entry) in &unit.certificates {
                tables.certificates.store(symbol, entry)?;
            }
            for (symbol, row) in &unit.candidates {
                tables.candidates.add(symbol, row)?;
            }
            tables
                .units
                .store(&unit.height.to_le_bytes(), &unit.encode())?;
            tables.sync()
        })?;

        self.height.store(height + 1, Ordering::Release);
        write_metadata(&self.config.directory, height + 1)?;
        debug!("pushed unit at height {height}");
        Ok(())
    }

    /// Reverse the most recently pushed unit through the LIFO delete paths
    /// and return it. Blob entries the unit overwrote were shadowed, not
    /// destroyed, so unlinking the unit's own entries re-exposes them.
    /// Fails with `Empty` when nothing has been pushed.
    pub fn pop(&self) -> Result<ChainUnit> {
        let height = self.height.load(Ordering::Acquire);
        if height == 0 {
            return Err(Error::Empty);
        }
        let top = height - 1;

        let unit = self.with_write(|tables| {
            let key = top.to_le_bytes();
            let encoded = tables
                .units
                .find(&key)?
                .ok_or(Error::Corrupted("journal entry missing for tip"))?;
            let unit = ChainUnit::decode(&encoded)?;

            // Undo in reverse application order; each collection's rows come
            // back off their chains most-recent first.
            for (symbol, _) in unit.candidates.iter().rev() {
                if !tables.candidates.delete_last(symbol)? {
                    return Err(Error::Corrupted("candidate row missing during rollback"));
                }
            }
            for (symbol, _) in unit.certificates.iter().rev() {
                if !tables.certificates.remove(symbol)? {
                    return Err(Error::Corrupted("certificate missing during rollback"));
                }
            }
            for (symbol, _) in unit.identifiers.iter().rev() {
                if !tables.identifiers.remove(symbol)? {
                    return Err(Error::Corrupted("identifier missing during rollback"));
                }
            }
            for (key, _) in unit.payments.iter().rev() {
                if !tables.history.delete_last(key)? {
                    return Err(Error::Corrupted("history row missing during rollback"));
                }
            }
            for (outpoint, _) in unit.spends.iter().rev() {
                if !tables.spends.remove(outpoint)? {
                    return Err(Error::Corrupted("spend missing during rollback"));
                }
            }
            if !tables.blocks.remove(&unit.hash)? {
                return Err(Error::Corrupted("block entry missing during rollback"));
            }
            if !tables.units.unlink(&key)? {
                return Err(Error::Corrupted("journal entry missing during rollback"));
            }
            tables.sync()?;
            Ok(unit)
        })?;

        self.height.store(top, Ordering::Release);
        write_metadata(&self.config.directory, top)?;
        debug!("popped unit at height {top}");
        Ok(unit)
    }

    // ---- typed reads -------------------------------------------------------

    pub fn block(&self, hash: &BlockHash) -> Result<Option<BlockEntry>> {
        self.with_read(|tables| tables.blocks.get(hash))
    }

    pub fn spend(&self, outpoint: &ChainPoint) -> Result<Option<ChainPoint>> {
        self.with_read(|tables| tables.spends.get(outpoint))
    }

    /// All history rows for an address, most recent first.
    pub fn history(&self, key: &PaymentKey) -> Result<Vec<HistoryRow>> {
        self.with_read(|tables| tables.history.get(key))
    }

    pub fn identifier(&self, symbol: &str) -> Result<Option<IdentifierEntry>> {
        self.with_read(|tables| tables.identifiers.get(symbol))
    }

    pub fn certificate(&self, symbol: &str) -> Result<Option<CertificateEntry>> {
        self.with_read(|tables| tables.certificates.get(symbol))
    }

    /// Candidate state rows, most recent first.
    pub fn candidates(&self, symbol: &str) -> Result<Vec<CandidateRow>> {
        self.with_read(|tables| tables.candidates.get(symbol))
    }

    // ---- wallet metadata (user-driven, outside push/pop) -------------------

    pub fn wallet(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.with_read(|tables| tables.wallets.get(name))
    }

    pub fn store_wallet(&self, name: &str, payload: &[u8]) -> Result<()> {
        self.with_write(|tables| {
            tables.wallets.store(name, payload)?;
            tables.wallets.sync()
        })
    }

    pub fn remove_wallet(&self, name: &str) -> Result<bool> {
        self.with_write(|tables| {
            let removed = tables.wallets.remove(name)?;
            tables.wallets.sync()?;
            Ok(removed)
        })
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// `[magic u32][version u32][height u64]`, rewritten whole on every update.
fn write_metadata(dir: &Path, height: u64) -> Result<()> {
    let mut buf = [0u8; 16];
    buf[0..4].copy_from_slice(&STORE_MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&STORE_VERSION.to_le_bytes());
    buf[8..16].copy_from_slice(&height.to_le_bytes());
    fs::write(dir.join(METADATA_FILE), buf)?;
    Ok(())
}

fn read_metadata(dir: &Path) -> Result<(u32, u64)> {
    let bytes = fs::read(dir.join(METADATA_FILE))?;
    if bytes.len() != 16 {
        return Err(Error::Corrupted("metadata file has wrong length"));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().expect("4 bytes"));
    if magic != STORE_MAGIC {
        return Err(Error::BadMagic);
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().expect("4 bytes"));
    let height = u64::from_le_bytes(bytes[8..16].try_into().expect("8 bytes"));
    Ok((version, height))
}
