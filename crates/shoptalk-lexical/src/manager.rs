//! Per-scope lexical snapshot lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use shoptalk_core::traits::CorpusStore;
use shoptalk_core::Result;

use crate::snapshot::LexicalSnapshot;

/// Owns one lexical snapshot per scope key and decides when each must be
/// rebuilt.
///
/// Writers bump the corpus version after every insert or delete;
/// `get_or_rebuild` compares the cached snapshot's version against the
/// counter and rebuilds a stale snapshot off to the side before publishing
/// it. The map lock is held across the rebuild, so rebuilds serialize and a
/// reader only ever observes a fully built snapshot. Rebuilding one scope
/// leaves every other scope's snapshot untouched.
pub struct IndexManager {
    store: Arc<dyn CorpusStore>,
    snapshots: Mutex<HashMap<Option<String>, Arc<LexicalSnapshot>>>,
    version: AtomicU64,
}

impl IndexManager {
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self {
            store,
            snapshots: Mutex::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Mark every cached snapshot stale. Cheap; the rebuild itself happens
    /// at the next query, so a burst of writes costs one rebuild.
    pub fn invalidate(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn get_or_rebuild(&self, scope: Option<&str>) -> Result<Arc<LexicalSnapshot>> {
        let key = scope.map(str::to_string);
        let mut snapshots = self.snapshots.lock().await;
        let current = self.version.load(Ordering::Acquire);
        if let Some(snapshot) = snapshots.get(&key) {
            if snapshot.version() == current {
                return Ok(snapshot.clone());
            }
        }

        let documents = self.store.all_documents(scope).await?;
        debug!(
            scope = scope.unwrap_or("<global>"),
            docs = documents.len(),
            version = current,
            "rebuilding lexical snapshot"
        );
        let snapshot = Arc::new(LexicalSnapshot::build(scope, documents, current));
        snapshots.insert(key, snapshot.clone());
        Ok(snapshot)
    }
}
