//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use caravan_engagement::{
    InteractionProcessor, LedgerReconciler, MemoryContentStore, StaticRoster,
};

use crate::config::ServerConfig;

/// Everything the route handlers need. The store and roster are shared with
/// the processor and reconciler through `Arc`.
pub struct AppState {
    pub store: Arc<MemoryContentStore>,
    pub roster: Arc<StaticRoster>,
    pub processor: InteractionProcessor<Arc<MemoryContentStore>>,
    pub reconciler: LedgerReconciler<Arc<MemoryContentStore>, Arc<StaticRoster>>,
    upload_seq: AtomicU64,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn from_config(config: &ServerConfig) -> SharedState {
        let store = Arc::new(MemoryContentStore::new());
        let roster = Arc::new(StaticRoster::new(config.participants()));
        Arc::new(Self {
            processor: InteractionProcessor::new(store.clone()),
            reconciler: LedgerReconciler::new(store.clone(), roster.clone()),
            store,
            roster,
            upload_seq: AtomicU64::new(1),
        })
    }

    /// Fresh content id for an uploaded photo. Id allocation belongs to the
    /// hosted document store; this stands in for it.
    pub fn next_content_id(&self) -> String {
        format!("photo-{}", self.upload_seq.fetch_add(1, Ordering::Relaxed))
    }
}
