//! Conference record: an ordered participant collection anchored on a
//! media bridge.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::bridge::BridgeHandle;
use crate::types::{ConferenceId, ParticipantId};

use super::participant::{Participant, ParticipantRole};

/// Tunables applied when a conference is created.
#[derive(Debug, Clone)]
pub struct ConferenceConfig {
    /// Cap on the participant collection; `None` keeps admissions unbounded.
    pub max_participants: Option<usize>,
    /// Request a video-capable bridge.
    pub video: bool,
}

impl Default for ConferenceConfig {
    fn default() -> Self {
        Self {
            max_participants: None,
            video: true,
        }
    }
}

/// A multi-party call grouping.
///
/// Owns the ordered participant collection (tail-append, traversal in
/// insertion order) and the moderator reference. The collection lock is
/// never held across an await point.
pub struct Conference {
    id: ConferenceId,
    bridge: BridgeHandle,
    participants: Mutex<Vec<Arc<Participant>>>,
    moderator: RwLock<Option<Arc<Participant>>>,
}

impl Conference {
    pub fn new(id: ConferenceId, bridge: BridgeHandle) -> Arc<Self> {
        Arc::new(Self {
            id,
            bridge,
            participants: Mutex::new(Vec::new()),
            moderator: RwLock::new(None),
        })
    }

    pub fn id(&self) -> ConferenceId {
        self.id
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    /// Appends a new participant, assigning the next size-derived id.
    ///
    /// Ids follow the collection size at insertion time, so an id freed by a
    /// removal can be handed out again later in the conference's life.
    pub fn admit(&self, role: ParticipantRole) -> Arc<Participant> {
        let mut participants = self.participants.lock();
        let id = ParticipantId(participants.len() as u32 + 1);
        let participant = Participant::new(id, role);
        participants.push(participant.clone());
        participant
    }

    /// Removes the participant from the collection, returning the remaining
    /// collection size.
    pub fn remove(&self, participant: &Arc<Participant>) -> usize {
        let mut participants = self.participants.lock();
        participants.retain(|p| !Arc::ptr_eq(p, participant));
        participants.len()
    }

    /// Snapshot of the collection in insertion order.
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        self.participants.lock().clone()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.lock().len()
    }

    /// Linear scan under the collection lock; first id match wins.
    pub fn participant_by_id(&self, id: ParticipantId) -> Option<Arc<Participant>> {
        let found = self
            .participants
            .lock()
            .iter()
            .find(|p| p.id() == id)
            .cloned();
        if found.is_none() {
            debug!(conference = %self.id, participant = %id, "participant not found");
        }
        found
    }

    pub fn moderator(&self) -> Option<Arc<Participant>> {
        self.moderator.read().clone()
    }

    pub fn set_moderator(&self, moderator: Option<Arc<Participant>>) {
        *self.moderator.write() = moderator;
    }

    pub fn is_moderator(&self, participant: &Arc<Participant>) -> bool {
        self.moderator
            .read()
            .as_ref()
            .is_some_and(|m| Arc::ptr_eq(m, participant))
    }

    /// Empties the collection for teardown, returning the drained records.
    pub(crate) fn drain_participants(&self) -> Vec<Arc<Participant>> {
        self.set_moderator(None);
        std::mem::take(&mut *self.participants.lock())
    }
}

impl fmt::Debug for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conference")
            .field("id", &self.id)
            .field("bridge", &self.bridge)
            .field("participants", &self.participant_count())
            .finish()
    }
}
