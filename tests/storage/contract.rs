//! Behavioural contract every `PasteStore` backend must satisfy.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pasteguard::{
    AttemptRecord, AttemptRule, AttemptUpsert, BurnUpdate, EncryptedBlob, MemoryStore, Paste,
    PasteStore, StorageError,
};

// ============================================================================
// Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn paste(id: &str, views: Option<u32>) -> Paste {
    Paste {
        id: id.into(),
        encrypted_body: EncryptedBlob {
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
            auth_tag: vec![7; 16],
            nonce: vec![9; 12],
        },
        language: "rust".into(),
        password_hash: Some("ab".repeat(32)),
        created_at: t0(),
        expires_at: Some(t0() + Duration::minutes(30)),
        remaining_views: views,
    }
}

fn rule(threshold: u32, now: DateTime<Utc>) -> AttemptRule {
    AttemptRule {
        threshold,
        now,
        lock_until: now + Duration::minutes(15),
    }
}

fn counted(
    store: &dyn PasteStore,
    paste_id: &str,
    client: &str,
    rule: &AttemptRule,
) -> AttemptRecord {
    match store.upsert_attempt(paste_id, client, rule).unwrap() {
        AttemptUpsert::Counted(record) => record,
        AttemptUpsert::Locked(record) => panic!("unexpectedly locked: {record:?}"),
    }
}

// ============================================================================
// Contract
// ============================================================================

fn insert_and_get_preserves_fields(store: &dyn PasteStore) {
    let original = paste("p1", Some(3));
    store.insert_paste(&original).unwrap();
    assert_eq!(store.get_paste("p1").unwrap(), Some(original));

    let mut unprotected = paste("p2", None);
    unprotected.password_hash = None;
    unprotected.expires_at = None;
    store.insert_paste(&unprotected).unwrap();
    assert_eq!(store.get_paste("p2").unwrap(), Some(unprotected));

    assert_eq!(store.get_paste("missing").unwrap(), None);
}

fn duplicate_ids_are_rejected(store: &dyn PasteStore) {
    store.insert_paste(&paste("dup", None)).unwrap();
    let mut other = paste("dup", Some(1));
    other.language = "go".into();
    assert!(matches!(
        store.insert_paste(&other),
        Err(StorageError::Duplicate(id)) if id == "dup"
    ));
    // The first write wins.
    assert_eq!(
        store.get_paste("dup").unwrap().unwrap().language,
        "rust".to_string()
    );
}

fn delete_reports_existence(store: &dyn PasteStore) {
    store.insert_paste(&paste("gone", None)).unwrap();
    assert!(store.delete_paste("gone").unwrap());
    assert!(!store.delete_paste("gone").unwrap());
    assert_eq!(store.get_paste("gone").unwrap(), None);
}

fn burn_decrements_to_zero_and_stops(store: &dyn PasteStore) {
    store.insert_paste(&paste("b", Some(2))).unwrap();
    assert_eq!(
        store.conditional_decrement_burn("b").unwrap(),
        BurnUpdate::Decremented(1)
    );
    assert_eq!(
        store.conditional_decrement_burn("b").unwrap(),
        BurnUpdate::Decremented(0)
    );
    assert_eq!(
        store.conditional_decrement_burn("b").unwrap(),
        BurnUpdate::AlreadyZero
    );
    assert_eq!(store.get_paste("b").unwrap().unwrap().remaining_views, Some(0));

    store.insert_paste(&paste("u", None)).unwrap();
    assert_eq!(
        store.conditional_decrement_burn("u").unwrap(),
        BurnUpdate::Unlimited
    );
    assert_eq!(
        store.conditional_decrement_burn("nope").unwrap(),
        BurnUpdate::NotFound
    );
}

fn attempts_lock_at_threshold(store: &dyn PasteStore) {
    let now = t0();
    assert_eq!(store.get_attempt("p", "ip").unwrap(), None);

    for expected in 1..=4 {
        assert_eq!(
            counted(store, "p", "ip", &rule(5, now)),
            AttemptRecord {
                attempts: expected,
                locked_until: None
            }
        );
    }
    let locked = counted(store, "p", "ip", &rule(5, now));
    assert_eq!(locked.attempts, 5);
    assert_eq!(locked.locked_until, Some(now + Duration::minutes(15)));
    assert_eq!(store.get_attempt("p", "ip").unwrap(), Some(locked));
}

fn locked_record_refuses_the_upsert(store: &dyn PasteStore) {
    let now = t0();
    for _ in 0..5 {
        counted(store, "p", "ip", &rule(5, now));
    }
    let locked = store.get_attempt("p", "ip").unwrap().unwrap();

    let during = now + Duration::minutes(14);
    assert_eq!(
        store.upsert_attempt("p", "ip", &rule(5, during)).unwrap(),
        AttemptUpsert::Locked(locked)
    );
    // Refused attempts leave the record untouched.
    assert_eq!(store.get_attempt("p", "ip").unwrap(), Some(locked));

    // At expiry one more attempt is counted and the lock is renewed.
    let after = now + Duration::minutes(15);
    let renewed = counted(store, "p", "ip", &rule(5, after));
    assert_eq!(renewed.attempts, 6);
    assert_eq!(renewed.locked_until, Some(after + Duration::minutes(15)));
}

fn lock_is_kept_below_threshold_and_refreshed_above(store: &dyn PasteStore) {
    let now = t0();
    let first = counted(store, "p", "ip", &rule(1, now));
    assert_eq!(first.locked_until, Some(now + Duration::minutes(15)));

    // A later attempt past the threshold moves the lock forward.
    let later = now + Duration::minutes(20);
    let again = counted(store, "p", "ip", &rule(1, later));
    assert_eq!(again.attempts, 2);
    assert_eq!(again.locked_until, Some(later + Duration::minutes(15)));

    // Under a higher threshold an expired lock is carried over unchanged.
    let much_later = later + Duration::minutes(30);
    let kept = counted(store, "p", "ip", &rule(10, much_later));
    assert_eq!(kept.attempts, 3);
    assert_eq!(kept.locked_until, again.locked_until);
}

fn reset_clears_only_existing_record(store: &dyn PasteStore) {
    let now = t0();
    for _ in 0..5 {
        counted(store, "p", "ip", &rule(5, now));
    }
    store.reset_attempt("p", "ip").unwrap();
    assert_eq!(
        store.get_attempt("p", "ip").unwrap(),
        Some(AttemptRecord::default())
    );
    assert_eq!(counted(store, "p", "ip", &rule(5, now)).attempts, 1);

    store.reset_attempt("p", "never-seen").unwrap();
    assert_eq!(store.get_attempt("p", "never-seen").unwrap(), None);
}

fn attempts_are_keyed_by_paste_and_client(store: &dyn PasteStore) {
    let now = t0();
    counted(store, "p1", "a", &rule(5, now));
    counted(store, "p1", "a", &rule(5, now));
    counted(store, "p1", "b", &rule(5, now));
    counted(store, "p2", "a", &rule(5, now));

    assert_eq!(store.get_attempt("p1", "a").unwrap().unwrap().attempts, 2);
    assert_eq!(store.get_attempt("p1", "b").unwrap().unwrap().attempts, 1);
    assert_eq!(store.get_attempt("p2", "a").unwrap().unwrap().attempts, 1);
}

macro_rules! contract_tests {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn insert_and_get() {
                insert_and_get_preserves_fields(&$make);
            }

            #[test]
            fn duplicates() {
                duplicate_ids_are_rejected(&$make);
            }

            #[test]
            fn delete() {
                delete_reports_existence(&$make);
            }

            #[test]
            fn burn() {
                burn_decrements_to_zero_and_stops(&$make);
            }

            #[test]
            fn lockout_threshold() {
                attempts_lock_at_threshold(&$make);
            }

            #[test]
            fn locked_refuses() {
                locked_record_refuses_the_upsert(&$make);
            }

            #[test]
            fn lock_refresh() {
                lock_is_kept_below_threshold_and_refreshed_above(&$make);
            }

            #[test]
            fn reset() {
                reset_clears_only_existing_record(&$make);
            }

            #[test]
            fn attempt_keys() {
                attempts_are_keyed_by_paste_and_client(&$make);
            }
        }
    };
}

contract_tests!(memory, MemoryStore::new());

#[cfg(feature = "sqlite")]
contract_tests!(
    sqlite,
    pasteguard::SqliteStore::open_in_memory().expect("open in-memory SQLite")
);

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pastes.db");

    {
        let store = pasteguard::SqliteStore::open(&path).unwrap();
        store.insert_paste(&paste("keep", Some(2))).unwrap();
        store.conditional_decrement_burn("keep").unwrap();
        counted(&store, "keep", "ip", &rule(5, t0()));
    }

    let store = pasteguard::SqliteStore::open(&path).unwrap();
    let reopened = store.get_paste("keep").unwrap().unwrap();
    assert_eq!(reopened.remaining_views, Some(1));
    assert_eq!(reopened.encrypted_body, paste("keep", None).encrypted_body);
    assert_eq!(store.get_attempt("keep", "ip").unwrap().unwrap().attempts, 1);
}
