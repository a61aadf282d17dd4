use chaindb::{
    CandidateRow, CertificateEntry, ChainPoint, ChainUnit, Database, DatabaseConfig, Error,
    HistoryRow, HistoryRowKind, IdentifierEntry, StoreFlags,
};
use tempfile::TempDir;

// Small bucket counts keep test stores compact; counts are fixed per store,
// so the same config must be used across restarts.
fn test_config(dir: &TempDir) -> DatabaseConfig {
    let mut config = DatabaseConfig::new(dir.path());
    config.block_buckets = 101;
    config.spend_buckets = 101;
    config.history_buckets = 101;
    config.identifier_buckets = 101;
    config.certificate_buckets = 101;
    config.candidate_buckets = 101;
    config.wallet_buckets = 101;
    config.unit_buckets = 101;
    config
}

// Common test setup
fn setup_database() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let mut db = Database::new(test_config(&dir));
    db.create().unwrap();
    db.start().unwrap();
    (dir, db)
}

fn point(seed: u8, index: u32) -> ChainPoint {
    ChainPoint {
        hash: [seed; 32],
        index,
    }
}

fn sample_unit(height: u64) -> ChainUnit {
    let seed = height as u8 + 1;
    ChainUnit {
        height,
        hash: [seed; 32],
        header: vec![seed; 80],
        spends: vec![
            (point(seed, 0), point(seed.wrapping_add(100), 0)),
            (point(seed, 1), point(seed.wrapping_add(100), 1)),
        ],
        payments: vec![
            (
                [seed; 20],
                HistoryRow {
                    kind: HistoryRowKind::Output,
                    point: point(seed, 0),
                    height,
                    value: 5000 + height,
                },
            ),
            (
                [seed; 20],
                HistoryRow {
                    kind: HistoryRowKind::Spend,
                    point: point(seed.wrapping_add(100), 0),
                    height,
                    value: 77,
                },
            ),
        ],
        identifiers: vec![(
            format!("id-{height}"),
            IdentifierEntry {
                address: [seed; 20],
                height,
            },
        )],
        certificates: vec![(
            format!("cert-{height}"),
            CertificateEntry {
                owner: format!("owner-{height}"),
                height,
                payload: vec![seed; 16],
            },
        )],
        candidates: vec![(
            "shared-candidate".to_string(),
            CandidateRow {
                point: point(seed, 2),
                height,
                status: seed,
            },
        )],
    }
}

#[test]
fn test_push_makes_unit_visible() {
    let (_dir, db) = setup_database();
    let unit = sample_unit(0);
    db.push(&unit).unwrap();

    let block = db.block(&unit.hash).unwrap().unwrap();
    assert_eq!(block.height, 0);
    assert_eq!(block.header, unit.header);

    assert_eq!(
        db.spend(&unit.spends[0].0).unwrap().unwrap(),
        unit.spends[0].1
    );

    let history = db.history(&unit.payments[0].0).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], unit.payments[1].1); // most recent first
    assert_eq!(history[1], unit.payments[0].1);

    assert_eq!(
        db.identifier("id-0").unwrap().unwrap(),
        unit.identifiers[0].1
    );
    assert_eq!(
        db.certificate("cert-0").unwrap().unwrap(),
        unit.certificates[0].1
    );
    assert_eq!(
        db.candidates("shared-candidate").unwrap(),
        vec![unit.candidates[0].1]
    );
    assert_eq!(db.height(), 1);
}

#[test]
fn test_unknown_keys_are_absent_everywhere() {
    let (_dir, db) = setup_database();
    db.push(&sample_unit(0)).unwrap();

    assert!(db.block(&[0xee; 32]).unwrap().is_none());
    assert!(db.spend(&point(0xee, 9)).unwrap().is_none());
    assert!(db.history(&[0xee; 20]).unwrap().is_empty());
    assert!(db.identifier("missing").unwrap().is_none());
    assert!(db.certificate("missing").unwrap().is_none());
    assert!(db.candidates("missing").unwrap().is_empty());
    assert!(db.wallet("missing").unwrap().is_none());
}

#[test]
fn test_pop_is_inverse_of_push() {
    let (_dir, db) = setup_database();
    let unit = sample_unit(0);
    db.push(&unit).unwrap();

    let popped = db.pop().unwrap();
    assert_eq!(popped, unit);
    assert_eq!(db.height(), 0);

    // Content-equal to the pre-push state: nothing reachable anymore.
    assert!(db.block(&unit.hash).unwrap().is_none());
    assert!(db.spend(&unit.spends[0].0).unwrap().is_none());
    assert!(db.history(&unit.payments[0].0).unwrap().is_empty());
    assert!(db.identifier("id-0").unwrap().is_none());
    assert!(db.certificate("cert-0").unwrap().is_none());
    assert!(db.candidates("shared-candidate").unwrap().is_empty());
}

#[test]
fn test_pop_restores_overwritten_entries() {
    let (_dir, db) = setup_database();

    let first_id = IdentifierEntry {
        address: [0xaa; 20],
        height: 0,
    };
    let second_id = IdentifierEntry {
        address: [0xbb; 20],
        height: 1,
    };
    let first_cert = CertificateEntry {
        owner: "alice".to_string(),
        height: 0,
        payload: vec![1; 8],
    };
    let second_cert = CertificateEntry {
        owner: "bob".to_string(),
        height: 1,
        payload: vec![2; 8],
    };

    // The second unit re-registers the first unit's symbols: an ownership
    // transfer of the same identifier and certificate.
    let mut first = sample_unit(0);
    first.identifiers = vec![("name".to_string(), first_id.clone())];
    first.certificates = vec![("cert".to_string(), first_cert.clone())];
    let mut second = sample_unit(1);
    second.identifiers = vec![("name".to_string(), second_id.clone())];
    second.certificates = vec![("cert".to_string(), second_cert.clone())];

    db.push(&first).unwrap();
    db.push(&second).unwrap();

    // The transfer shadows the original registrations while it is tip.
    assert_eq!(db.identifier("name").unwrap().unwrap(), second_id);
    assert_eq!(db.certificate("cert").unwrap().unwrap(), second_cert);

    // Rolling the transfer back re-exposes them, it does not erase them.
    assert_eq!(db.pop().unwrap(), second);
    assert_eq!(db.identifier("name").unwrap().unwrap(), first_id);
    assert_eq!(db.certificate("cert").unwrap().unwrap(), first_cert);

    assert_eq!(db.pop().unwrap(), first);
    assert!(db.identifier("name").unwrap().is_none());
    assert!(db.certificate("cert").unwrap().is_none());
}

#[test]
fn test_pop_unwinds_only_the_tip() {
    let (_dir, db) = setup_database();
    let first = sample_unit(0);
    let second = sample_unit(1);
    db.push(&first).unwrap();
    db.push(&second).unwrap();

    assert_eq!(db.pop().unwrap(), second);
    assert_eq!(db.height(), 1);

    // The first unit's state survives; the shared candidate history rolled
    // back to exactly one row.
    assert!(db.block(&first.hash).unwrap().is_some());
    assert!(db.block(&second.hash).unwrap().is_none());
    assert_eq!(
        db.candidates("shared-candidate").unwrap(),
        vec![first.candidates[0].1]
    );

    assert_eq!(db.pop().unwrap(), first);
    assert!(matches!(db.pop(), Err(Error::Empty)));
}

#[test]
fn test_push_requires_next_height() {
    let (_dir, db) = setup_database();
    assert!(matches!(
        db.push(&sample_unit(5)),
        Err(Error::UnexpectedHeight {
            got: 5,
            expected: 0
        })
    ));
}

#[test]
fn test_reader_isolation_handles() {
    let (_dir, db) = setup_database();

    // Entirely before the write: consistent.
    let before = db.begin_read();
    assert!(db.is_read_valid(before));

    // Overlapping the write: the handle must invalidate and force a retry.
    let overlapping = db.begin_read();
    db.begin_write();
    let mid_write = db.begin_read();
    db.end_write();
    assert!(!db.is_read_valid(overlapping));
    assert!(!db.is_read_valid(mid_write));

    // Entirely after: consistent again.
    let after = db.begin_read();
    assert!(db.is_read_valid(after));
}

#[test]
fn test_concurrent_readers_never_observe_torn_state() {
    let (_dir, db) = setup_database();

    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let db = &db;
                scope.spawn(move || {
                    for _ in 0..200 {
                        // Absent or complete, never torn. Exhausting the
                        // bounded retry against a long write bracket is part
                        // of the contract, not a torn read.
                        match db.block(&[1u8; 32]) {
                            Ok(Some(entry)) => {
                                assert_eq!(entry.height, 0);
                                assert_eq!(entry.header, vec![1u8; 80]);
                            }
                            Ok(None) => {}
                            Err(Error::ReadContention(_)) => {}
                            Err(err) => panic!("reader observed failure: {err}"),
                        }
                    }
                })
            })
            .collect();

        for height in 0..10 {
            db.push(&sample_unit(height)).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    });
}

#[test]
fn test_wallet_rows_update_and_remove() {
    let (_dir, db) = setup_database();

    db.store_wallet("hot", b"ciphertext-1").unwrap();
    assert_eq!(db.wallet("hot").unwrap().unwrap(), b"ciphertext-1".to_vec());

    // Same name replaces, it does not accumulate.
    db.store_wallet("hot", b"ciphertext-2").unwrap();
    assert_eq!(db.wallet("hot").unwrap().unwrap(), b"ciphertext-2".to_vec());

    assert!(db.remove_wallet("hot").unwrap());
    assert!(!db.remove_wallet("hot").unwrap());
    assert!(db.wallet("hot").unwrap().is_none());
}

#[test]
fn test_stop_start_preserves_state() {
    let dir = TempDir::new().unwrap();
    let unit = sample_unit(0);

    {
        let mut db = Database::new(test_config(&dir));
        db.create().unwrap();
        db.start().unwrap();
        db.push(&unit).unwrap();
        db.store_wallet("w", b"payload").unwrap();
        db.stop().unwrap();
    }

    let mut db = Database::new(test_config(&dir));
    db.start().unwrap();
    assert_eq!(db.height(), 1);
    assert_eq!(db.block(&unit.hash).unwrap().unwrap().header, unit.header);
    assert_eq!(db.wallet("w").unwrap().unwrap(), b"payload".to_vec());

    // The journal survived too, so the unit is still poppable.
    assert_eq!(db.pop().unwrap(), unit);
    db.close().unwrap();
}

#[test]
fn test_second_process_start_is_refused() {
    let dir = TempDir::new().unwrap();
    let mut first = Database::new(test_config(&dir));
    first.create().unwrap();
    first.start().unwrap();

    let mut second = Database::new(test_config(&dir));
    assert!(matches!(second.start(), Err(Error::AlreadyLocked)));

    // Releasing the first allows the second in.
    first.stop().unwrap();
    second.start().unwrap();
    second.close().unwrap();
}

#[test]
fn test_create_refuses_existing_store() {
    let dir = TempDir::new().unwrap();
    let mut db = Database::new(test_config(&dir));
    db.create().unwrap();
    drop(db);

    let mut again = Database::new(test_config(&dir));
    assert!(matches!(again.create(), Err(Error::AlreadyExists)));
}

#[test]
fn test_readonly_store_refuses_writes() {
    let dir = TempDir::new().unwrap();
    let unit = sample_unit(0);

    {
        let mut db = Database::new(test_config(&dir));
        db.create().unwrap();
        db.start().unwrap();
        db.push(&unit).unwrap();
        db.stop().unwrap();
    }

    let mut config = test_config(&dir);
    config.flags = StoreFlags::READONLY;
    let mut db = Database::new(config);
    db.start().unwrap();

    assert_eq!(db.block(&unit.hash).unwrap().unwrap().height, 0);
    assert!(matches!(db.push(&sample_unit(1)), Err(Error::ReadOnly)));
    assert!(matches!(db.pop(), Err(Error::ReadOnly)));
    assert!(matches!(
        db.store_wallet("w", b"x"),
        Err(Error::ReadOnly)
    ));
    db.close().unwrap();
}

#[test]
fn test_operations_require_started_store() {
    let dir = TempDir::new().unwrap();
    let mut db = Database::new(test_config(&dir));
    db.create().unwrap();

    assert!(matches!(db.block(&[0; 32]), Err(Error::NotStarted)));
    assert!(matches!(db.push(&sample_unit(0)), Err(Error::NotStarted)));
}

#[test]
fn test_corrupt_metadata_fails_start() {
    let dir = TempDir::new().unwrap();
    let mut db = Database::new(test_config(&dir));
    db.create().unwrap();
    drop(db);

    std::fs::write(dir.path().join("metadata"), [0u8; 16]).unwrap();
    let mut db = Database::new(test_config(&dir));
    assert!(matches!(db.start(), Err(Error::BadMagic)));
}
