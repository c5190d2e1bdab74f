use std::sync::Arc;

use chrono::Utc;
use shoptalk_core::traits::CorpusStore;
use shoptalk_core::types::Note;
use shoptalk_lexical::IndexManager;
use shoptalk_store::MemoryStore;

fn note(id: &str, text: &str, machine: Option<&str>) -> Note {
    Note {
        id: id.to_string(),
        text: text.to_string(),
        machine: machine.map(str::to_string),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn snapshot_is_reused_until_invalidated() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_note(&note("n1", "spindle bearing noise", None), None)
        .await
        .expect("insert");

    let manager = IndexManager::new(store.clone());
    let first = manager.get_or_rebuild(None).await.expect("build");
    let second = manager.get_or_rebuild(None).await.expect("cached");
    assert!(Arc::ptr_eq(&first, &second), "unchanged corpus serves the cached snapshot");

    store
        .insert_note(&note("n2", "coolant level low", None), None)
        .await
        .expect("insert");
    manager.invalidate();

    let third = manager.get_or_rebuild(None).await.expect("rebuild");
    assert!(!Arc::ptr_eq(&second, &third), "invalidation forces a rebuild");
    assert_eq!(third.doc_count(), 2);
}

#[tokio::test]
async fn one_invalidation_covers_a_burst_of_writes() {
    let store = Arc::new(MemoryStore::new());
    let manager = IndexManager::new(store.clone());

    for i in 0..5 {
        store
            .insert_note(&note(&format!("n{i}"), "tool change note", None), None)
            .await
            .expect("insert");
        manager.invalidate();
    }
    let snapshot = manager.get_or_rebuild(None).await.expect("build");
    assert_eq!(snapshot.doc_count(), 5);
    let again = manager.get_or_rebuild(None).await.expect("cached");
    assert!(Arc::ptr_eq(&snapshot, &again));
}

#[tokio::test]
async fn scopes_hold_independent_snapshots() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_note(&note("n1", "spindle bearing noise", Some("m1")), None)
        .await
        .expect("insert");
    store
        .insert_note(&note("n2", "coolant level low", None), None)
        .await
        .expect("insert");

    let manager = IndexManager::new(store);
    let scoped = manager.get_or_rebuild(Some("m1")).await.expect("scoped");
    assert_eq!(scoped.doc_count(), 2, "machine note plus the global note");
    assert_eq!(scoped.scope(), Some("m1"));

    let other = manager.get_or_rebuild(Some("m2")).await.expect("other scope");
    assert_eq!(other.doc_count(), 1, "only the global note is visible");

    // Rebuilding another scope must not disturb the first scope's snapshot.
    let scoped_again = manager.get_or_rebuild(Some("m1")).await.expect("scoped again");
    assert!(Arc::ptr_eq(&scoped, &scoped_again));
}

#[tokio::test]
async fn unknown_scope_behaves_as_empty_corpus() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_note(&note("n1", "scoped note", Some("m1")), None)
        .await
        .expect("insert");

    let manager = IndexManager::new(store);
    let snapshot = manager.get_or_rebuild(Some("no-such-machine")).await.expect("build");
    assert!(snapshot.is_empty());
}
