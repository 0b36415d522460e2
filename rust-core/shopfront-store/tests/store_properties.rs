// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Behavioural properties of the document store: persistence, id assignment,
// filtering, recovery from bad files and the debounced id sequencer.

use std::time::Duration;

use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use shopfront_store::{
    Condition, Document, InMemoryBackend, JsonFileBackend, Record, StorageBackend, Store,
    StoreConfig,
};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn stored_sequence(backend: &InMemoryBackend, table: &str) -> Option<u64> {
    let bytes = backend.read().await.unwrap()?;
    Document::from_slice(&bytes).unwrap().sequence(table)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_save_then_load_round_trips() {
    let store = Store::new(InMemoryBackend::new());
    let mut document = Document::new();
    document
        .table_mut("categories")
        .push(record(json!({"id": 1, "name": "Books", "tags": ["a", "b"]})));
    document.set_sequence("categories", 2);

    assert!(store.save(&document).await);
    assert_eq!(store.load().await, document);
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("database.json");

    let first = Store::open(&path, StoreConfig::default()).await;
    first
        .insert("users", record(json!({"username": "alice"})))
        .await;
    first
        .insert("users", record(json!({"username": "bob"})))
        .await;
    drop(first);

    let second = Store::open(&path, StoreConfig::default()).await;
    let users = second.all("users", None).await;
    assert_eq!(users.len(), 2);
    assert_eq!(users[1]["username"], "bob");

    let next = second
        .insert("users", record(json!({"username": "carol"})))
        .await;
    assert_eq!(next["id"], 3);
}

#[tokio::test]
async fn test_file_on_disk_is_pretty_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.json");
    let store = Store::open(&path, StoreConfig::default()).await;
    store
        .insert("categories", record(json!({"name": "Books"})))
        .await;

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"categories\": ["));
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["sequences"]["categories"], 2);
}

#[tokio::test]
async fn test_corrupt_file_loads_as_fresh_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("database.json");
    std::fs::write(&path, b"{\"users\": [ {\"id\": 1,").unwrap();

    let store = Store::with_config(JsonFileBackend::new(&path), StoreConfig::default());
    assert_eq!(store.load().await, Document::new());

    // Initializing replaces the damaged file with a valid document.
    assert!(store.initialize().await);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(Document::from_slice(text.as_bytes()).is_ok());
}

#[tokio::test]
async fn test_non_table_members_do_not_discard_the_file() {
    let backend = InMemoryBackend::with_bytes(
        r#"{"users": [{"id": 1, "username": "alice"}], "sequences": {"users": 2}, "meta": {"version": 2}}"#,
    );
    let store = Store::new(backend.clone());

    assert_eq!(store.all("users", None).await.len(), 1);
    let bob = store
        .insert("users", record(json!({"username": "bob"})))
        .await;
    assert_eq!(bob["id"], 2);

    let bytes = backend.read().await.unwrap().unwrap();
    let on_disk: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(on_disk["meta"], json!({"version": 2}));
    assert_eq!(on_disk["users"][0]["username"], "alice");
    assert_eq!(on_disk["users"][1]["username"], "bob");
}

#[tokio::test]
async fn test_unknown_table_reads_empty_and_is_created_on_insert() {
    let store = Store::new(InMemoryBackend::new());
    assert!(store.all("wishlists", None).await.is_empty());
    assert!(store.get("wishlists", None).await.is_none());

    store
        .insert("wishlists", record(json!({"user_id": 1})))
        .await;
    assert!(store.load().await.has_table("wishlists"));
}

// ---------------------------------------------------------------------------
// Table operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = Store::new(InMemoryBackend::new());
    for user in [1, 2, 1] {
        store
            .insert("cart_items", record(json!({"user_id": user})))
            .await;
    }

    let condition = Condition::field("user_id", 1);
    assert!(store.delete("cart_items", &condition).await);
    let after_once = store.load().await;
    assert!(store.delete("cart_items", &condition).await);
    assert_eq!(store.load().await, after_once);
    assert_eq!(after_once.table("cart_items").len(), 1);
}

#[tokio::test]
async fn test_update_then_get_reflects_patch() {
    let store = Store::new(InMemoryBackend::new());
    let original = store
        .insert("addresses", record(json!({"name": "Home", "is_default": false})))
        .await;

    store
        .update("addresses", 1, record(json!({"is_default": true})))
        .await
        .unwrap();

    let current = store
        .get("addresses", Some(&Condition::by_id(1)))
        .await
        .unwrap();
    assert_eq!(current["is_default"], true);
    assert_eq!(current["created_at"], original["created_at"]);
}

// ---------------------------------------------------------------------------
// Debounced id reservation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_next_id_is_unique_before_flush() {
    let backend = InMemoryBackend::new();
    let store = Store::new(backend.clone());
    store.initialize().await;

    assert_eq!(store.next_id("orders").await, 1);
    assert_eq!(store.next_id("orders").await, 2);
    assert_eq!(store.next_id("orders").await, 3);
    assert_eq!(stored_sequence(&backend, "orders").await, Some(1));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(stored_sequence(&backend, "orders").await, Some(4));
    assert!(!store.sequencer().has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_later_reservations_do_not_delay_flush() {
    let backend = InMemoryBackend::new();
    let store = Store::new(backend.clone());
    store.initialize().await;

    store.next_id("orders").await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    store.next_id("orders").await;
    assert_eq!(stored_sequence(&backend, "orders").await, Some(1));

    // 110ms after the first reservation: the original deadline has passed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stored_sequence(&backend, "orders").await, Some(3));
    assert!(!store.sequencer().is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_insert_skips_reserved_ids() {
    let store = Store::new(InMemoryBackend::new());
    store.initialize().await;

    assert_eq!(store.next_id("orders").await, 1);
    let stored = store.insert("orders", record(json!({"total": 10}))).await;
    assert_eq!(stored["id"], 2);
    assert_eq!(store.next_id("orders").await, 3);
}

#[tokio::test]
async fn test_failed_flush_keeps_reservations() {
    let backend = InMemoryBackend::new();
    let store = Store::with_config(
        backend.clone(),
        StoreConfig {
            debounce: Duration::from_secs(3600),
        },
    );
    store.initialize().await;

    backend.set_reject_writes(true);
    assert_eq!(store.next_id("users").await, 1);
    assert!(!store.flush_pending().await);
    assert_eq!(store.sequencer().watermark("users"), Some(2));
    // A retry is scheduled for the restored reservations.
    assert!(store.sequencer().is_armed());
    assert_eq!(store.next_id("users").await, 2);

    backend.set_reject_writes(false);
    assert!(store.flush_pending().await);
    assert_eq!(stored_sequence(&backend, "users").await, Some(3));

    // Nothing left: flushing again is a successful no-op.
    assert!(store.flush_pending().await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_retried_after_debounce() {
    let backend = InMemoryBackend::new();
    let store = Store::new(backend.clone());
    store.initialize().await;

    backend.set_reject_writes(true);
    assert_eq!(store.next_id("orders").await, 1);
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(stored_sequence(&backend, "orders").await, Some(1));
    assert!(store.sequencer().is_armed());

    backend.set_reject_writes(false);
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(stored_sequence(&backend, "orders").await, Some(2));
    assert!(!store.sequencer().is_armed());
}

#[tokio::test]
async fn test_flush_never_lowers_stored_sequence() {
    let backend = InMemoryBackend::new();
    let store = Store::with_config(
        backend.clone(),
        StoreConfig {
            debounce: Duration::from_secs(3600),
        },
    );
    store.initialize().await;

    assert_eq!(store.next_id("shops").await, 1);
    // Another writer moves the file ahead in the meantime.
    let mut document = store.load().await;
    document.set_sequence("shops", 40);
    backend.replace(document.to_pretty_vec().unwrap()).await;

    assert!(store.flush_pending().await);
    assert_eq!(stored_sequence(&backend, "shops").await, Some(40));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_inserted_ids_strictly_increase(tables in prop::collection::vec(0usize..3, 1..25)) {
        let names = ["orders", "products", "reviews"];
        runtime().block_on(async {
            let store = Store::new(InMemoryBackend::new());
            let mut last = [0u64; 3];
            for table in &tables {
                let stored = store.insert(names[*table], Record::new()).await;
                let id = stored["id"].as_u64().unwrap();
                assert!(id > last[*table]);
                last[*table] = id;
            }
            for (i, name) in names.iter().enumerate() {
                let ids: Vec<u64> = store
                    .all(name, None)
                    .await
                    .iter()
                    .filter_map(|r| r["id"].as_u64())
                    .collect();
                let expected: Vec<u64> = (1..=ids.len() as u64).collect();
                assert_eq!(ids, expected);
                assert_eq!(ids.last().copied().unwrap_or(0), last[i]);
            }
        });
    }

    #[test]
    fn prop_field_filter_matches_manual_filter(
        owners in prop::collection::vec(0u64..4, 0..20),
        wanted in 0u64..4,
    ) {
        runtime().block_on(async {
            let store = Store::new(InMemoryBackend::new());
            for owner in &owners {
                store.insert("addresses", record(json!({"user_id": owner}))).await;
            }
            let filtered = store
                .all("addresses", Some(&Condition::field("user_id", wanted)))
                .await;
            let expected: Vec<Record> = store
                .all("addresses", None)
                .await
                .into_iter()
                .filter(|r| r["user_id"] == json!(wanted))
                .collect();
            assert_eq!(filtered, expected);
            assert_eq!(
                filtered.len(),
                owners.iter().filter(|o| **o == wanted).count()
            );
        });
    }

    #[test]
    fn prop_update_preserves_identity(
        price in any::<u32>(),
        fake_id in any::<u64>(),
        stamp in "[a-z]{1,8}",
    ) {
        runtime().block_on(async {
            let store = Store::new(InMemoryBackend::new());
            let original = store.insert("products", record(json!({"price": 1}))).await;
            let updated = store
                .update(
                    "products",
                    1,
                    record(json!({"price": price, "id": fake_id, "created_at": stamp})),
                )
                .await
                .unwrap();
            assert_eq!(updated["id"], 1);
            assert_eq!(updated["created_at"], original["created_at"]);
            assert_eq!(updated["price"], json!(price));
        });
    }
}
