//! Conference lifecycle events.
//!
//! Handlers registered on the engine observe membership changes without
//! reaching into conference state.

use async_trait::async_trait;

use crate::types::{ConferenceId, ParticipantId};

/// Notification emitted by the engine after a state change has been applied.
#[derive(Debug, Clone)]
pub enum ConferenceEvent {
    ConferenceCreated {
        conference_id: ConferenceId,
    },
    ParticipantJoined {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    ParticipantLeft {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
    },
    ParticipantMuted {
        conference_id: ConferenceId,
        participant_id: ParticipantId,
        muted: bool,
    },
    ConferenceEnded {
        conference_id: ConferenceId,
    },
}

/// Receives conference events published by the engine.
#[async_trait]
pub trait ConferenceEventHandler: Send + Sync {
    async fn handle_event(&self, event: ConferenceEvent);
}
