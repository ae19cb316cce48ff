use blib_common::{BookmarkId, OwnerId};
use blib_sync::{DeleteOutcome, PushEvent, ReconciliationEngine, RemoteStore, SyncError};
use blib_test_helpers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn engine_for(store: &MemoryStore) -> Arc<ReconciliationEngine> {
    suppress_logs();
    Arc::new(ReconciliationEngine::new(owner(), Arc::new(store.clone())))
}

async fn seeded(rows: Vec<blib_common::Bookmark>) -> (MemoryStore, Arc<ReconciliationEngine>) {
    let store = MemoryStore::with_rows(rows);
    let engine = engine_for(&store);
    engine.resync().await.unwrap();
    (store, engine)
}

#[tokio::test]
async fn test_add_inserts_confirmed_row_at_front() {
    let (_store, engine) = seeded(vec![bookmark("b1", at(9, 0))]).await;

    let created = engine.add("https://example.com", "Example").await.unwrap();

    assert_eq!(created.id.as_str(), "a1");
    assert_eq!(created.owner_id, owner());
    let snapshot = engine.snapshot();
    assert_eq!(ids(snapshot.as_slice()), vec!["a1", "b1"]);
    assert_collection_invariants(snapshot.as_slice());
}

#[tokio::test]
async fn test_add_validates_before_contacting_store() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);

    let err = engine.add("   ", "Example").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    let err = engine.add("https://example.com", "").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    assert_eq!(store.calls().creates, 0);
    assert!(engine.is_empty());
}

#[tokio::test]
async fn test_failed_add_leaves_collection_unchanged() {
    let (store, engine) = seeded(vec![bookmark("b1", at(9, 0))]).await;
    store.fail_next_create("new row violates row-level security policy");

    let err = engine.add("https://example.com", "Example").await.unwrap_err();

    match err {
        SyncError::Remote(e) => {
            assert_eq!(e.message, "new row violates row-level security policy")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
}

#[tokio::test]
async fn test_push_insert_before_create_response_yields_one_item() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);
    let mut feed = store.subscribe(&owner()).await.unwrap();
    assert!(matches!(feed.next().await, Some(PushEvent::Status(_))));

    let gate = store.pause_next_create();
    let adding = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.add("https://example.com", "Example").await })
    };
    timeout(WAIT, gate.entered()).await.unwrap();

    // the store has applied the row and echoed it; the response is parked
    let echoed = timeout(WAIT, feed.next()).await.unwrap().unwrap();
    assert!(engine.apply(echoed));
    assert_eq!(engine.len(), 1);

    gate.release();
    let created = timeout(WAIT, adding).await.unwrap().unwrap().unwrap();

    assert_eq!(created.id.as_str(), "a1");
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["a1"]);
}

#[tokio::test]
async fn test_create_response_before_push_insert_yields_one_item() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);
    let mut feed = store.subscribe(&owner()).await.unwrap();
    feed.next().await;

    engine.add("https://example.com", "Example").await.unwrap();
    let echoed = feed.next().await.unwrap();

    assert!(!engine.apply(echoed));
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["a1"]);
}

#[tokio::test]
async fn test_repeated_insert_is_idempotent() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);
    let row = bookmark("b1", at(10, 0));

    assert!(engine.merge_remote_insert(row.clone()));
    assert!(!engine.merge_remote_insert(row.clone()));
    assert!(!engine.merge_remote_insert(row));

    assert_eq!(engine.len(), 1);
}

#[tokio::test]
async fn test_late_insert_keeps_newest_first_order() {
    let (_store, engine) = seeded(vec![bookmark("b3", at(10, 10)), bookmark("b1", at(10, 0))]).await;

    engine.merge_remote_insert(bookmark("b2", at(10, 5)));

    let snapshot = engine.snapshot();
    assert_eq!(ids(snapshot.as_slice()), vec!["b3", "b2", "b1"]);
    assert_collection_invariants(snapshot.as_slice());
}

#[tokio::test]
async fn test_delete_is_visible_before_store_responds() {
    let (store, engine) = seeded(vec![bookmark("b2", at(10, 5)), bookmark("b1", at(10, 0))]).await;
    let gate = store.pause_next_delete();

    let deleting = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.delete(&BookmarkId::new("b2")).await })
    };
    timeout(WAIT, gate.entered()).await.unwrap();

    assert!(!engine.contains(&BookmarkId::new("b2")));
    assert_eq!(store.rows_for(&owner()).len(), 2);

    gate.release();
    let outcome = timeout(WAIT, deleting).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(ids(&store.rows_for(&owner())), vec!["b1"]);
}

#[tokio::test]
async fn test_push_delete_during_local_delete_is_absorbed() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;
    let gate = store.pause_next_delete();

    let deleting = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.delete(&BookmarkId::new("b1")).await })
    };
    timeout(WAIT, gate.entered()).await.unwrap();

    assert!(!engine.merge_remote_delete(&BookmarkId::new("b1"), Some(&owner())));

    gate.release();
    timeout(WAIT, deleting).await.unwrap().unwrap().unwrap();
    assert!(engine.is_empty());
}

#[tokio::test]
async fn test_delete_of_absent_id_is_a_no_op() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;
    let changes = engine.subscribe();

    let outcome = engine.delete(&BookmarkId::new("missing")).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Absent);
    assert_eq!(store.calls().deletes, 0);
    assert!(!changes.has_changed().unwrap());
    assert!(!engine.merge_remote_delete(&BookmarkId::new("missing"), None));
}

#[tokio::test]
async fn test_failed_delete_restores_store_state() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0)), bookmark("b2", at(10, 5))]).await;
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b2", "b1"]);
    store.fail_next_delete("permission denied");

    let err = engine.delete(&BookmarkId::new("b2")).await.unwrap_err();

    match err {
        SyncError::Remote(e) => assert_eq!(e.message, "permission denied"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b2", "b1"]);
    assert_eq!(store.calls().fetches, 2);
}

#[tokio::test]
async fn test_failed_delete_with_failed_resync_returns_delete_error() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0)), bookmark("b2", at(10, 5))]).await;
    store.fail_next_delete("permission denied");
    store.fail_next_fetch("network unreachable");

    let err = engine.delete(&BookmarkId::new("b2")).await.unwrap_err();

    match err {
        SyncError::Remote(e) => assert_eq!(e.message, "permission denied"),
        other => panic!("unexpected error: {other:?}"),
    }
    // the optimistic removal stands until a later resync succeeds
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
    assert_eq!(ids(&store.rows_for(&owner())), vec!["b2", "b1"]);

    engine.resync().await.unwrap();
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b2", "b1"]);
}

#[tokio::test]
async fn test_resync_drops_rows_deleted_elsewhere() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0)), bookmark("b2", at(10, 5))]).await;
    store.delete_row(&BookmarkId::new("b1"));

    let count = engine.resync().await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b2"]);
}

#[tokio::test]
async fn test_failed_resync_keeps_last_known_collection() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;
    store.fail_next_fetch("network unreachable");

    assert!(engine.resync().await.is_err());
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
}

#[tokio::test]
async fn test_foreign_events_are_ignored() {
    let (_store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;

    assert!(!engine.merge_remote_insert(bookmark_for("x1", &other_owner(), at(11, 0))));
    assert!(!engine.merge_remote_delete(&BookmarkId::new("b1"), Some(&other_owner())));

    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
}

#[tokio::test]
async fn test_resync_only_keeps_own_rows() {
    let store = MemoryStore::with_rows(vec![
        bookmark("b1", at(10, 0)),
        bookmark_for("x1", &other_owner(), at(10, 1)),
    ]);
    let engine = engine_for(&store);

    engine.resync().await.unwrap();

    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
    let theirs = ReconciliationEngine::new(OwnerId::new(OTHER_OWNER), Arc::new(store.clone()));
    theirs.resync().await.unwrap();
    assert_eq!(ids(theirs.snapshot().as_slice()), vec!["x1"]);
}

#[tokio::test]
async fn test_pending_delete_holds_one_id() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0)), bookmark("b2", at(10, 5))]).await;
    let b1 = BookmarkId::new("b1");
    let b2 = BookmarkId::new("b2");

    assert!(engine.mark_pending_delete(&b1));
    assert!(engine.mark_pending_delete(&b2));
    assert_eq!(engine.pending_delete(), Some(b2.clone()));
    assert!(!engine.mark_pending_delete(&BookmarkId::new("missing")));
    assert_eq!(engine.pending_delete(), Some(b2.clone()));

    let outcome = engine.confirm_pending_delete().await.unwrap();

    assert_eq!(outcome, Some(DeleteOutcome::Deleted));
    assert_eq!(engine.pending_delete(), None);
    assert_eq!(ids(engine.snapshot().as_slice()), vec!["b1"]);
    assert_eq!(ids(&store.rows_for(&owner())), vec!["b1"]);
}

#[tokio::test]
async fn test_cancel_pending_delete_sends_nothing() {
    let (store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;
    let b1 = BookmarkId::new("b1");

    engine.mark_pending_delete(&b1);
    assert_eq!(engine.cancel_pending_delete(), Some(b1));

    assert_eq!(engine.confirm_pending_delete().await.unwrap(), None);
    assert_eq!(store.calls().deletes, 0);
    assert_eq!(engine.len(), 1);
}

#[tokio::test]
async fn test_pending_cleared_when_item_deleted_elsewhere() {
    let (_store, engine) = seeded(vec![bookmark("b1", at(10, 0))]).await;
    let b1 = BookmarkId::new("b1");

    engine.mark_pending_delete(&b1);
    engine.merge_remote_delete(&b1, None);

    assert_eq!(engine.pending_delete(), None);
}

#[tokio::test]
async fn test_snapshot_observers_see_each_change() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);
    let mut changes = engine.subscribe();

    engine.add("https://example.com", "Example").await.unwrap();

    assert!(changes.has_changed().unwrap());
    assert_eq!(ids(changes.borrow_and_update().as_slice()), vec!["a1"]);
}

#[tokio::test]
async fn test_add_then_delete_example() {
    let store = MemoryStore::new();
    let engine = engine_for(&store);

    let created = engine.add("https://example.com", "Example").await.unwrap();
    assert_eq!(created.id.as_str(), "a1");
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.as_slice()[0].url, "https://example.com");
    assert_eq!(snapshot.as_slice()[0].title, "Example");

    let gate = store.pause_next_delete();
    let deleting = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.delete(&BookmarkId::new("a1")).await })
    };
    timeout(WAIT, gate.entered()).await.unwrap();
    assert!(engine.is_empty());

    gate.release();
    let outcome = timeout(WAIT, deleting).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(engine.is_empty());
    assert!(store.rows_for(&owner()).is_empty());
}
