use chaindb::RecordMultimap;
use tempfile::TempDir;

const ROW_SIZE: u32 = 8;

// Common test setup
fn setup_multimap(bucket_count: u32) -> (TempDir, RecordMultimap) {
    let dir = TempDir::new().unwrap();
    let map = RecordMultimap::create(
        &dir.path().join("lookup"),
        &dir.path().join("rows"),
        bucket_count,
        ROW_SIZE,
    )
    .unwrap();
    (dir, map)
}

fn row(n: u64) -> Vec<u8> {
    n.to_le_bytes().to_vec()
}

#[test]
fn test_rows_come_back_lifo() {
    let (_dir, map) = setup_multimap(16);

    for n in 1..=5u64 {
        map.add_row(b"addr", &row(n)).unwrap();
    }

    let got: Vec<Vec<u8>> = map.rows(b"addr").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec![row(5), row(4), row(3), row(2), row(1)]);
}

#[test]
fn test_delete_last_restores_empty_state() {
    let (_dir, map) = setup_multimap(16);

    for n in 1..=3u64 {
        map.add_row(b"addr", &row(n)).unwrap();
    }
    for _ in 0..3 {
        assert!(map.delete_last_row(b"addr").unwrap());
    }

    assert!(map.lookup(b"addr").unwrap().is_none());
    assert_eq!(map.rows(b"addr").unwrap().count(), 0);
}

#[test]
fn test_delete_is_lifo_one_at_a_time() {
    let (_dir, map) = setup_multimap(16);

    map.add_row(b"addr", &row(1)).unwrap();
    map.add_row(b"addr", &row(2)).unwrap();
    assert!(map.delete_last_row(b"addr").unwrap());

    let got: Vec<Vec<u8>> = map.rows(b"addr").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec![row(1)]);

    // Re-adding after a delete prepends like any other add.
    map.add_row(b"addr", &row(3)).unwrap();
    let got: Vec<Vec<u8>> = map.rows(b"addr").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec![row(3), row(1)]);
}

#[test]
fn test_over_delete_fails_cleanly() {
    let (_dir, map) = setup_multimap(16);

    map.add_row(b"a", &row(1)).unwrap();
    map.add_row(b"b", &row(2)).unwrap();

    assert!(map.delete_last_row(b"a").unwrap());
    // One more delete than adds: a clean no-op, not corruption.
    assert!(!map.delete_last_row(b"a").unwrap());
    assert!(!map.delete_last_row(b"never_added").unwrap());

    // Unrelated keys are untouched.
    let got: Vec<Vec<u8>> = map.rows(b"b").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec![row(2)]);
}

#[test]
fn test_keys_are_independent_under_collision() {
    // One bucket: every key shares a collision chain in the lookup table.
    let (_dir, map) = setup_multimap(1);

    map.add_row(b"first", &row(10)).unwrap();
    map.add_row(b"second", &row(20)).unwrap();
    map.add_row(b"first", &row(11)).unwrap();

    let first: Vec<Vec<u8>> = map.rows(b"first").unwrap().map(|r| r.unwrap()).collect();
    let second: Vec<Vec<u8>> = map.rows(b"second").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(first, vec![row(11), row(10)]);
    assert_eq!(second, vec![row(20)]);
}

#[test]
fn test_iteration_is_restartable() {
    let (_dir, map) = setup_multimap(16);

    map.add_row(b"addr", &row(1)).unwrap();
    map.add_row(b"addr", &row(2)).unwrap();

    let mut iter = map.rows(b"addr").unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), row(2));
    drop(iter);

    // A fresh iterator starts again from the head.
    let again: Vec<Vec<u8>> = map.rows(b"addr").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(again, vec![row(2), row(1)]);
}

#[test]
fn test_sync_and_restart() {
    let dir = TempDir::new().unwrap();
    let lookup = dir.path().join("lookup");
    let rows = dir.path().join("rows");

    {
        let map = RecordMultimap::create(&lookup, &rows, 16, ROW_SIZE).unwrap();
        map.add_row(b"addr", &row(1)).unwrap();
        map.add_row(b"addr", &row(2)).unwrap();
        map.sync().unwrap();
    }

    let map = RecordMultimap::start(&lookup, &rows, 16, ROW_SIZE, false).unwrap();
    let got: Vec<Vec<u8>> = map.rows(b"addr").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec![row(2), row(1)]);
}

#[test]
fn test_many_rows_force_arena_growth() {
    let (_dir, map) = setup_multimap(16);

    // 12 bytes per record, so ~10k rows cross the initial 64 KiB mapping.
    for n in 0..10_000u64 {
        map.add_row(&(n % 7).to_le_bytes(), &row(n)).unwrap();
    }

    let key = 3u64.to_le_bytes();
    let newest = map.rows(&key).unwrap().next().unwrap().unwrap();
    assert_eq!(newest, row(9999));
    assert_eq!(map.rows(&key).unwrap().count(), 1429);
}
