//! Holder of the active corpus snapshot
use super::CorpusSnapshot;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Single-writer, multi-reader slot for the active snapshot
///
/// The lock guards only the pointer. Readers clone the `Arc` and release the
/// lock immediately; installing a new snapshot swaps the pointer and never
/// touches a snapshot that a query may still be reading.
#[derive(Default)]
pub struct SnapshotStore {
    active: RwLock<Option<Arc<CorpusSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the active snapshot for the duration of one query
    pub fn current(&self) -> Option<Arc<CorpusSnapshot>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active snapshot, returning the previous one
    pub fn install(&self, snapshot: CorpusSnapshot) -> Option<Arc<CorpusSnapshot>> {
        let next = Arc::new(snapshot);
        info!(
            "Installing snapshot {} ({} chunks)",
            next.version(),
            next.len()
        );
        let mut guard = self.active.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(next)
    }

    pub fn is_empty(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
