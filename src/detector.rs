use tracing::{debug, warn};

use crate::model::Selection;
use crate::observability::{STORE_READ_ERRORS_TOTAL, rejection_counter};
use crate::store::{SelectionStore, Snapshot};

/// Remembers the last stored value it saw and reports only differences.
///
/// An empty store is a value too: clearing the selection and submitting the
/// same one again counts as a change. A fresh detector has seen an empty
/// store, so the first stored selection after start always counts.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: Option<Snapshot>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while the store was last seen empty.
    pub fn last_seen(&self) -> Option<&Snapshot> {
        self.last_seen.as_ref()
    }

    /// Record `snapshot` (or its absence). Returns whether it differs from the
    /// previous one.
    pub fn observe(&mut self, snapshot: Option<Snapshot>) -> bool {
        if self.last_seen == snapshot {
            return false;
        }
        self.last_seen = snapshot;
        true
    }

    /// Read the store once. Yields a selection only when the stored value
    /// changed and decodes. A failed read keeps the previous observation.
    pub async fn sample<S: SelectionStore + ?Sized>(&mut self, store: &S) -> Option<Selection> {
        let snapshot = match store.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{e}; keeping current selection");
                metrics::counter!(STORE_READ_ERRORS_TOTAL).increment(1);
                return None;
            }
        };
        if !self.observe(snapshot.clone()) {
            return None;
        }
        let Some(snapshot) = snapshot else {
            debug!("stored selection cleared");
            return None;
        };
        debug!("stored selection changed");
        match snapshot.decode() {
            Ok(selection) => Some(selection),
            Err(e) => {
                warn!("ignoring stored selection: {e}");
                metrics::counter!(rejection_counter(&e)).increment(1);
                None
            }
        }
    }
}
