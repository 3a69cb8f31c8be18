//! Local Store Tests
//!
//! Ordering, idempotence, and the unread counter invariant.

mod common;

use common::{notification, read_notification, BASE_TIME};
use shopbell::app::store::NotificationStore;
use time::Duration;
use uuid::Uuid;

fn assert_consistent(store: &NotificationStore) {
    let unread = store.records().iter().filter(|r| !r.is_read).count();
    assert_eq!(store.unread_count(), unread);
}

fn ids(store: &NotificationStore) -> Vec<Uuid> {
    store.records().iter().map(|r| r.id).collect()
}

// ===========================================================================
// replace_all
// ===========================================================================

#[test]
fn replace_all_orders_newest_first() {
    let user = Uuid::new_v4();
    let a = notification(user, 3);
    let b = notification(user, 1);
    let c = notification(user, 2);

    let mut store = NotificationStore::new();
    store.replace_all(vec![a.clone(), b.clone(), c.clone()]);

    assert_eq!(ids(&store), vec![a.id, c.id, b.id]);
    assert_eq!(store.unread_count(), 3);
}

#[test]
fn replace_all_keeps_input_order_for_equal_timestamps() {
    let user = Uuid::new_v4();
    let first = notification(user, 5);
    let second = notification(user, 5);

    let mut store = NotificationStore::new();
    store.replace_all(vec![first.clone(), second.clone()]);

    assert_eq!(ids(&store), vec![first.id, second.id]);
}

#[test]
fn replace_all_recomputes_counter_from_scratch() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    store.replace_all(vec![notification(user, 1), notification(user, 2)]);
    assert_eq!(store.unread_count(), 2);

    store.replace_all(vec![read_notification(user, 3), notification(user, 4)]);
    assert_eq!(store.len(), 2);
    assert_eq!(store.unread_count(), 1);
}

#[test]
fn replace_all_drops_duplicate_ids() {
    let user = Uuid::new_v4();
    let record = notification(user, 1);

    let mut store = NotificationStore::new();
    store.replace_all(vec![record.clone(), record.clone()]);

    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 1);
}

// ===========================================================================
// insert_one
// ===========================================================================

#[test]
fn insert_into_empty_store() {
    let user = Uuid::new_v4();
    let n1 = notification(user, 1);

    let mut store = NotificationStore::new();
    assert!(store.insert_one(n1.clone()));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.records, vec![n1]);
    assert_eq!(snapshot.unread_count, 1);
}

#[test]
fn insert_same_id_twice_is_idempotent() {
    let user = Uuid::new_v4();
    let record = notification(user, 1);

    let mut once = NotificationStore::new();
    once.insert_one(record.clone());

    let mut twice = NotificationStore::new();
    assert!(twice.insert_one(record.clone()));
    assert!(!twice.insert_one(record));

    assert_eq!(once.snapshot(), twice.snapshot());
}

#[test]
fn newest_insert_lands_at_head() {
    let user = Uuid::new_v4();
    let older = notification(user, 1);
    let newer = notification(user, 10);

    let mut store = NotificationStore::new();
    store.replace_all(vec![older.clone()]);
    store.insert_one(newer.clone());

    assert_eq!(ids(&store), vec![newer.id, older.id]);
}

#[test]
fn insert_with_equal_timestamp_goes_ahead_of_existing() {
    let user = Uuid::new_v4();
    let existing = notification(user, 5);
    let pushed = notification(user, 5);

    let mut store = NotificationStore::new();
    store.replace_all(vec![existing.clone()]);
    store.insert_one(pushed.clone());

    assert_eq!(ids(&store), vec![pushed.id, existing.id]);
}

#[test]
fn out_of_order_insert_keeps_sort_order() {
    let user = Uuid::new_v4();
    let newest = notification(user, 30);
    let oldest = notification(user, 10);
    let middle = notification(user, 20);

    let mut store = NotificationStore::new();
    store.replace_all(vec![newest.clone(), oldest.clone()]);
    store.insert_one(middle.clone());

    assert_eq!(ids(&store), vec![newest.id, middle.id, oldest.id]);
}

#[test]
fn inserting_read_record_leaves_counter() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    store.insert_one(read_notification(user, 1));

    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 0);
}

// ===========================================================================
// mark_read / mark_all_read
// ===========================================================================

#[test]
fn mark_read_stamps_read_at_and_decrements() {
    let user = Uuid::new_v4();
    let record = notification(user, 1);
    let at = BASE_TIME + Duration::hours(1);

    let mut store = NotificationStore::new();
    store.insert_one(record.clone());
    assert!(store.mark_read(record.id, at));

    let stored = store.get(record.id).unwrap();
    assert!(stored.is_read);
    assert_eq!(stored.read_at, Some(at));
    assert_eq!(store.unread_count(), 0);
}

#[test]
fn mark_read_on_read_record_is_noop() {
    let user = Uuid::new_v4();
    let record = notification(user, 1);
    let first = BASE_TIME + Duration::hours(1);
    let second = BASE_TIME + Duration::hours(2);

    let mut store = NotificationStore::new();
    store.replace_all(vec![record.clone(), notification(user, 2)]);
    store.mark_read(record.id, first);
    let before = store.snapshot();

    assert!(!store.mark_read(record.id, second));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.get(record.id).unwrap().read_at, Some(first));
}

#[test]
fn mark_read_unknown_id_is_noop() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    store.insert_one(notification(user, 1));

    assert!(!store.mark_read(Uuid::new_v4(), BASE_TIME));
    assert_eq!(store.unread_count(), 1);
}

#[test]
fn mark_all_read_clears_counter_and_stamps_every_record() {
    let user = Uuid::new_v4();
    let already = read_notification(user, 1);
    let at = BASE_TIME + Duration::days(1);

    let mut store = NotificationStore::new();
    store.replace_all(vec![notification(user, 2), notification(user, 3), already.clone()]);

    assert_eq!(store.mark_all_read(at), 2);
    assert_eq!(store.unread_count(), 0);
    assert!(store.records().iter().all(|r| r.is_read && r.read_at.is_some()));
    // Previously read records keep their original stamp.
    assert_eq!(store.get(already.id).unwrap().read_at, already.read_at);
}

// ===========================================================================
// remove / remove_all / reset
// ===========================================================================

#[test]
fn remove_unread_record_decrements() {
    let user = Uuid::new_v4();
    let n1 = notification(user, 1);

    let mut store = NotificationStore::new();
    store.insert_one(n1.clone());
    assert_eq!(store.remove(n1.id).map(|r| r.id), Some(n1.id));

    assert!(store.is_empty());
    assert_eq!(store.unread_count(), 0);
}

#[test]
fn remove_read_record_keeps_counter() {
    let user = Uuid::new_v4();
    let read = read_notification(user, 1);

    let mut store = NotificationStore::new();
    store.replace_all(vec![read.clone(), notification(user, 2)]);
    store.remove(read.id);

    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 1);
}

#[test]
fn remove_unknown_id_is_noop() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    store.insert_one(notification(user, 1));

    assert!(store.remove(Uuid::new_v4()).is_none());
    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 1);
}

#[test]
fn remove_all_and_reset_empty_the_store() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    store.replace_all(vec![notification(user, 1), notification(user, 2)]);

    assert_eq!(store.remove_all(), 2);
    assert!(store.is_empty());
    assert_eq!(store.unread_count(), 0);

    store.insert_one(notification(user, 3));
    store.reset();
    assert!(store.is_empty());
    assert_eq!(store.unread_count(), 0);
}

#[test]
fn removed_id_can_be_inserted_again() {
    let user = Uuid::new_v4();
    let record = notification(user, 1);

    let mut store = NotificationStore::new();
    store.insert_one(record.clone());
    store.remove(record.id);

    assert!(store.insert_one(record));
    assert_eq!(store.unread_count(), 1);
}

// ===========================================================================
// Counter invariant over a mixed operation sequence
// ===========================================================================

#[test]
fn counter_matches_records_after_every_operation() {
    let user = Uuid::new_v4();
    let mut store = NotificationStore::new();
    let mut known: Vec<Uuid> = Vec::new();
    // Small LCG so the sequence is reproducible.
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as usize
    };

    for step in 0..500 {
        let pick = if known.is_empty() {
            Uuid::new_v4()
        } else {
            known[next() % known.len()]
        };

        match next() % 7 {
            0 | 1 => {
                let record = if next() % 3 == 0 {
                    read_notification(user, step)
                } else {
                    notification(user, step)
                };
                known.push(record.id);
                store.insert_one(record);
            }
            2 => {
                store.mark_read(pick, BASE_TIME);
            }
            3 => {
                store.remove(pick);
            }
            4 => {
                if let Some(existing) = store.get(pick).cloned() {
                    // Duplicate delivery of something already held.
                    store.insert_one(existing);
                }
            }
            5 => {
                if next() % 4 == 0 {
                    store.mark_all_read(BASE_TIME);
                } else {
                    let batch: Vec<_> = (0..3).map(|i| notification(user, step * 10 + i)).collect();
                    known.extend(batch.iter().map(|r| r.id));
                    store.replace_all(batch);
                }
            }
            _ => {
                if next() % 10 == 0 {
                    store.remove_all();
                }
            }
        }

        assert_consistent(&store);
    }
}
