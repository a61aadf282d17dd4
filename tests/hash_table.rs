use chaindb::{Error, SlabTable};
use tempfile::TempDir;

// Common test setup
fn setup_table(bucket_count: u32) -> (TempDir, SlabTable) {
    let dir = TempDir::new().unwrap();
    let table = SlabTable::create(&dir.path().join("table"), bucket_count).unwrap();
    (dir, table)
}

#[test]
fn test_store_find_roundtrip() {
    let (_dir, table) = setup_table(16);

    table.store(b"alice", &[1, 2, 3]).unwrap();
    table.store(b"bob", &[4, 5]).unwrap();

    assert_eq!(table.find(b"alice").unwrap().unwrap(), vec![1, 2, 3]);
    assert_eq!(table.find(b"bob").unwrap().unwrap(), vec![4, 5]);
}

#[test]
fn test_unknown_key_is_absent_not_error() {
    let (_dir, table) = setup_table(16);
    assert!(table.find(b"never_stored").unwrap().is_none());

    table.store(b"present", b"x").unwrap();
    assert!(table.find(b"absent").unwrap().is_none());
}

#[test]
fn test_colliding_keys_resolve_by_chaining() {
    // A single bucket forces every key into the same collision chain.
    let (_dir, table) = setup_table(1);

    table.store(b"alice", &[1, 2, 3]).unwrap();
    table.store(b"bob", &[4, 5]).unwrap();

    assert_eq!(table.find(b"alice").unwrap().unwrap(), vec![1, 2, 3]);
    assert_eq!(table.find(b"bob").unwrap().unwrap(), vec![4, 5]);

    // Unlinking one half of the chain leaves the other reachable.
    assert!(table.unlink(b"alice").unwrap());
    assert!(table.find(b"alice").unwrap().is_none());
    assert_eq!(table.find(b"bob").unwrap().unwrap(), vec![4, 5]);
}

#[test]
fn test_unlink_absent_key() {
    let (_dir, table) = setup_table(16);
    assert!(!table.unlink(b"ghost").unwrap());
}

#[test]
fn test_unlink_middle_of_chain() {
    let (_dir, table) = setup_table(1);

    table.store(b"first", b"1").unwrap();
    table.store(b"second", b"2").unwrap();
    table.store(b"third", b"3").unwrap();

    // "second" sits mid-chain between the newest and oldest entries.
    assert!(table.unlink(b"second").unwrap());
    assert_eq!(table.find(b"first").unwrap().unwrap(), b"1".to_vec());
    assert!(table.find(b"second").unwrap().is_none());
    assert_eq!(table.find(b"third").unwrap().unwrap(), b"3".to_vec());
}

#[test]
fn test_update_in_place() {
    let (_dir, table) = setup_table(16);

    table.store(b"key", &[0, 0, 0, 0]).unwrap();
    assert!(table.update(b"key", &[9, 9, 9, 9]).unwrap());
    assert_eq!(table.find(b"key").unwrap().unwrap(), vec![9, 9, 9, 9]);

    assert!(!table.update(b"ghost", &[1]).unwrap());
    assert!(matches!(
        table.update(b"key", &[1, 2]),
        Err(Error::BadRowSize { .. })
    ));
}

#[test]
fn test_growth_preserves_earlier_entries() {
    let (_dir, table) = setup_table(16);

    // Well past the initial 64 KiB mapping, forcing several grows.
    let value = vec![0xabu8; 1024];
    for i in 0..256u32 {
        table.store(&i.to_le_bytes(), &value).unwrap();
    }

    for i in 0..256u32 {
        assert_eq!(table.find(&i.to_le_bytes()).unwrap().unwrap(), value);
    }
}

#[test]
fn test_sync_and_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table");

    {
        let table = SlabTable::create(&path, 16).unwrap();
        table.store(b"persistent", &[42]).unwrap();
        table.store(b"removed", &[7]).unwrap();
        table.unlink(b"removed").unwrap();
        table.sync().unwrap();
    }

    let table = SlabTable::start(&path, 16, false).unwrap();
    assert_eq!(table.find(b"persistent").unwrap().unwrap(), vec![42]);
    assert!(table.find(b"removed").unwrap().is_none());
}

#[test]
fn test_start_validates_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table");
    drop(SlabTable::create(&path, 16).unwrap());

    // Incompatible bucket count is fatal, not silently adopted.
    assert!(matches!(
        SlabTable::start(&path, 32, false),
        Err(Error::BucketCountMismatch {
            on_disk: 16,
            configured: 32
        })
    ));

    // A non-chaindb file is rejected outright.
    std::fs::write(dir.path().join("junk"), vec![0u8; 4096]).unwrap();
    assert!(matches!(
        SlabTable::start(&dir.path().join("junk"), 16, false),
        Err(Error::BadMagic)
    ));
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("table");
    drop(SlabTable::create(&path, 16).unwrap());
    assert!(matches!(
        SlabTable::create(&path, 16),
        Err(Error::AlreadyExists)
    ));
}
