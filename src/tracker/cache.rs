//! Memoized tracker handles, one per (nick, project).

use super::{Tracker, TrackerFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily creates and caches tracker handles keyed by (nick, project id).
///
/// Entries are never evicted. [`TrackerCache::forget`] drops a nick's handles
/// so the next lookup reconnects with the nick's new token.
pub struct TrackerCache {
    factory: Arc<dyn TrackerFactory>,
    handles: HashMap<(String, u64), Arc<dyn Tracker>>,
}

impl TrackerCache {
    pub fn new(factory: Arc<dyn TrackerFactory>) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
        }
    }

    /// Return the cached handle for `(nick, project_id)`, connecting with
    /// `token` on first use.
    pub fn tracker_for(&mut self, nick: &str, project_id: u64, token: &str) -> Arc<dyn Tracker> {
        let factory = &self.factory;
        self.handles
            .entry((nick.to_owned(), project_id))
            .or_insert_with(|| {
                tracing::debug!(nick, project_id, "connecting tracker handle");
                factory.connect(project_id, token)
            })
            .clone()
    }

    /// Drop every cached handle belonging to `nick`.
    pub fn forget(&mut self, nick: &str) {
        self.handles.retain(|(owner, _), _| owner != nick);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
