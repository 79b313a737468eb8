//! Registry of live conferences.
//!
//! An explicit owned structure injected into the engine; its lifecycle is
//! tied to server start/stop rather than ambient global state. The id
//! allocator lives here as well.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::ConferenceId;

use super::room::Conference;

/// Conference ids start one above this reserved range.
const RESERVED_ID_CEILING: u32 = 99;

/// Index of live conferences, safe for concurrent readers and writers.
pub struct ConferenceRegistry {
    conferences: DashMap<ConferenceId, Arc<Conference>>,
    last_id: AtomicU32,
}

impl ConferenceRegistry {
    pub fn new() -> Self {
        Self {
            conferences: DashMap::new(),
            last_id: AtomicU32::new(RESERVED_ID_CEILING),
        }
    }

    /// Hands out the next conference id. Ids are monotonically increasing
    /// and never reused within a run.
    pub(crate) fn allocate_id(&self) -> ConferenceId {
        ConferenceId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub(crate) fn insert(&self, conference: Arc<Conference>) {
        self.conferences.insert(conference.id(), conference);
    }

    pub(crate) fn remove(&self, id: ConferenceId) -> Option<Arc<Conference>> {
        self.conferences.remove(&id).map(|(_, conference)| conference)
    }

    /// Lookup by id; a miss is silent apart from a diagnostic.
    pub fn find_by_id(&self, id: ConferenceId) -> Option<Arc<Conference>> {
        let found = self.conferences.get(&id).map(|entry| entry.value().clone());
        if found.is_none() {
            debug!(conference = %id, "conference not found");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.conferences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conferences.is_empty()
    }

    pub fn ids(&self) -> Vec<ConferenceId> {
        self.conferences.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for ConferenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
