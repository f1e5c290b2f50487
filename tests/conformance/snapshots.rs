//! Snapshot isolation and lifecycle

use snapkv::{prefix_range, KvDatabase, KvReader, KvSnapshot, KvTransaction};

use crate::{bytes_of, cleanup_prefix, ctx, keys_of, put_all, read_string};

fn set_one<D: KvDatabase>(db: &D, key: &str, value: &str) {
    put_all(db, &[(key.as_bytes(), value.as_bytes())]);
}

pub fn test_snapshot_isolation<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestSnapshotIsolation/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let key = format!("{}key", PREFIX);

    set_one(db, &key, "v1");
    let old = db.new_snapshot(&ctx).unwrap();

    set_one(db, &key, "v2");
    assert_eq!(read_string(old.get(&ctx, &key).unwrap()), "v1");

    let new = db.new_snapshot(&ctx).unwrap();
    assert_eq!(read_string(new.get(&ctx, &key).unwrap()), "v2");

    // A later delete is invisible to both
    let mut tx = db.new_transaction(&ctx).unwrap();
    tx.delete(&ctx, &key).unwrap();
    tx.commit(&ctx).unwrap();

    assert_eq!(read_string(old.get(&ctx, &key).unwrap()), "v1");
    assert_eq!(read_string(new.get(&ctx, &key).unwrap()), "v2");
    assert!(db.new_snapshot(&ctx).unwrap().get(&ctx, &key).unwrap_err().is_not_found());

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_snapshot_frozen_at_creation<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestSnapshotFrozenAtCreation/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let early = format!("{}early", PREFIX);
    let late = format!("{}late", PREFIX);

    set_one(db, &early, "x");
    let snap = db.new_snapshot(&ctx).unwrap();

    // Started before the snapshot, committed after it
    let mut tx = db.new_transaction(&ctx).unwrap();
    tx.set_bytes(&ctx, &late, "y").unwrap();
    tx.commit(&ctx).unwrap();

    assert!(snap.get(&ctx, &late).unwrap_err().is_not_found());
    let (begin, end) = prefix_range(PREFIX.as_bytes());
    assert_eq!(
        keys_of(snap.ascend(&ctx, &begin, &end).unwrap()),
        bytes_of(&[early.clone()])
    );
    assert_eq!(
        keys_of(snap.descend(&ctx, &begin, &end).unwrap()),
        bytes_of(&[early])
    );

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_snapshot_repeatable_read<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestSnapshotRepeatableRead/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let key = format!("{}counter", PREFIX);

    set_one(db, &key, "0");
    let snap = db.new_snapshot(&ctx).unwrap();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            for i in 1..=50 {
                set_one(db, &key, &i.to_string());
            }
        });

        for _ in 0..50 {
            assert_eq!(read_string(snap.get(&ctx, &key).unwrap()), "0");
        }
    })
    .unwrap();

    assert_eq!(read_string(snap.get(&ctx, &key).unwrap()), "0");
    let latest = db.new_snapshot(&ctx).unwrap();
    assert_eq!(read_string(latest.get(&ctx, &key).unwrap()), "50");

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_snapshot_iterator_prefix_range<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestSnapshotIteratorPrefixRange/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();

    let inside: Vec<String> = ["a", "b", "b/c", "z"]
        .iter()
        .map(|s| format!("{}{}", PREFIX, s))
        .collect();
    // Sort just before and just after the prefix
    let outside = [
        "/TestSnapshotIteratorPrefixRange".to_string(),
        "/TestSnapshotIteratorPrefixRange0".to_string(),
    ];

    let mut pairs: Vec<(&[u8], &[u8])> = inside.iter().map(|k| (k.as_bytes(), &b"in"[..])).collect();
    pairs.extend(outside.iter().map(|k| (k.as_bytes(), &b"out"[..])));
    put_all(db, &pairs);

    let snap = db.new_snapshot(&ctx).unwrap();
    let (begin, end) = prefix_range(PREFIX.as_bytes());

    let entries: Vec<(Vec<u8>, String)> = snap
        .ascend(&ctx, &begin, &end)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (e.key.to_vec(), read_string(e.value))
        })
        .collect();
    assert_eq!(entries.len(), inside.len());
    for ((key, value), want) in entries.iter().zip(&inside) {
        assert_eq!(key, want.as_bytes());
        assert_eq!(value, "in");
    }

    let mut reversed = bytes_of(&inside);
    reversed.reverse();
    assert_eq!(keys_of(snap.descend(&ctx, &begin, &end).unwrap()), reversed);

    let mut tx = db.new_transaction(&ctx).unwrap();
    for key in &outside {
        tx.delete(&ctx, key).unwrap();
    }
    tx.commit(&ctx).unwrap();
    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_snapshot_iterator_stability<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestSnapshotIteratorStability/";
    const KEYS: usize = 10;
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();

    let keys: Vec<String> = (0..KEYS).map(|i| format!("{}{:02}", PREFIX, i)).collect();
    let pairs: Vec<(&[u8], &[u8])> = keys.iter().map(|k| (k.as_bytes(), &b"v1"[..])).collect();
    put_all(db, &pairs);

    let snap = db.new_snapshot(&ctx).unwrap();
    let (begin, end) = prefix_range(PREFIX.as_bytes());

    crossbeam::scope(|s| {
        s.spawn(|_| {
            let ctx = crate::ctx();
            for round in 0..20 {
                let mut tx = db.new_transaction(&ctx).unwrap();
                for key in &keys {
                    tx.set_bytes(&ctx, key, format!("v{}", round + 2)).unwrap();
                }
                tx.set_bytes(&ctx, format!("{}new{}", PREFIX, round), "extra")
                    .unwrap();
                tx.commit(&ctx).unwrap();
            }
        });

        for _ in 0..3 {
            let mut seen = 0;
            for entry in snap.ascend(&ctx, &begin, &end).unwrap() {
                let entry = entry.unwrap();
                assert_eq!(read_string(entry.value), "v1");
                seen += 1;
            }
            assert_eq!(seen, KEYS);
        }
    })
    .unwrap();

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_discarded_snapshot_behavior<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestDiscardedSnapshotBehavior/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let key = format!("{}key", PREFIX);
    set_one(db, &key, "value");

    let mut snap = db.new_snapshot(&ctx).unwrap();
    assert!(snap.get(&ctx, &key).is_ok());

    snap.discard(&ctx).unwrap();
    snap.discard(&ctx).unwrap();

    assert!(snap.get(&ctx, &key).unwrap_err().is_closed());
    assert!(snap.ascend(&ctx, "", "").unwrap_err().is_closed());
    assert!(snap.descend(&ctx, "", "").unwrap_err().is_closed());

    // Discard ignores cancellation
    let cancelled = ctx.with_timeout(std::time::Duration::ZERO);
    snap.discard(&cancelled).unwrap();

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_iterator_stops_after_discard<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestIteratorStopsAfterDiscard/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let keys: Vec<String> = (0..5).map(|i| format!("{}{}", PREFIX, i)).collect();
    let pairs: Vec<(&[u8], &[u8])> = keys.iter().map(|k| (k.as_bytes(), &b"v"[..])).collect();
    put_all(db, &pairs);

    let mut snap = db.new_snapshot(&ctx).unwrap();
    let (begin, end) = prefix_range(PREFIX.as_bytes());
    let mut asc = snap.ascend(&ctx, &begin, &end).unwrap();
    let mut desc = snap.descend(&ctx, &begin, &end).unwrap();

    assert_eq!(asc.next().unwrap().unwrap().key(), keys[0].as_bytes());
    assert_eq!(desc.next().unwrap().unwrap().key(), keys[4].as_bytes());

    snap.discard(&ctx).unwrap();

    assert!(asc.next().is_none());
    assert!(desc.next().is_none());

    // Dropping a snapshot has the same effect
    let snap = db.new_snapshot(&ctx).unwrap();
    let mut iter = snap.ascend(&ctx, &begin, &end).unwrap();
    drop(snap);
    assert!(iter.next().is_none());

    cleanup_prefix(db, PREFIX.as_bytes());
}

pub fn test_garbage_collection_respects_open_readers<D: KvDatabase>(db: &D) {
    const PREFIX: &str = "/TestGarbageCollectionRespectsOpenReaders/";
    cleanup_prefix(db, PREFIX.as_bytes());
    let ctx = ctx();
    let key = format!("{}key", PREFIX);

    set_one(db, &key, "v1");
    let mut snap = db.new_snapshot(&ctx).unwrap();
    set_one(db, &key, "v2");
    set_one(db, &key, "v3");
    let mut tx = db.new_transaction(&ctx).unwrap();
    set_one(db, &key, "v4");

    assert_eq!(db.collect_garbage(), 0);
    assert_eq!(read_string(snap.get(&ctx, &key).unwrap()), "v1");
    assert_eq!(read_string(tx.get(&ctx, &key).unwrap()), "v3");

    // v1 and v2 are only reachable from the snapshot
    snap.discard(&ctx).unwrap();
    assert_eq!(db.collect_garbage(), 2);
    assert_eq!(read_string(tx.get(&ctx, &key).unwrap()), "v3");

    tx.rollback(&ctx).unwrap();
    assert_eq!(db.collect_garbage(), 1);
    assert_eq!(read_string(db.new_snapshot(&ctx).unwrap().get(&ctx, &key).unwrap()), "v4");

    // A deleted key disappears once nobody can see its last value
    let mut tx = db.new_transaction(&ctx).unwrap();
    tx.delete(&ctx, &key).unwrap();
    tx.commit(&ctx).unwrap();
    assert_eq!(db.collect_garbage(), 2);
    assert_eq!(db.stats().keys, 0);

    // An iterator outliving its transaction still reads its start point
    set_one(db, &key, "a");
    let mut tx = db.new_transaction(&ctx).unwrap();
    let (begin, end) = prefix_range(PREFIX.as_bytes());
    let iter = tx.ascend(&ctx, &begin, &end).unwrap();
    tx.rollback(&ctx).unwrap();
    set_one(db, &key, "b");
    db.collect_garbage();

    let values: Vec<String> = iter
        .map(|entry| read_string(entry.unwrap().value))
        .collect();
    assert_eq!(values, vec!["a".to_string()]);

    cleanup_prefix(db, PREFIX.as_bytes());
}
