//! Error types for the conference core.
//!
//! Every failure in this crate is local: operations report a
//! [`ConferenceError`] through the crate [`Result`] alias and log a
//! diagnostic, but never abort the process.

use thiserror::Error;

use crate::types::{ConferenceId, ParticipantId};

/// Main result type for conference operations
pub type Result<T> = std::result::Result<T, ConferenceError>;

/// Main error type for conference operations
#[derive(Debug, Clone, Error)]
pub enum ConferenceError {
    /// The channel is not in a state that allows conferencing
    #[error("invalid channel state: {0}")]
    InvalidChannelState(String),

    /// The channel has no live underlying call leg
    #[error("channel has no underlying call leg")]
    MissingCallLeg,

    /// The channel's call leg is not bridged to a remote party
    #[error("call leg has no bridged peer")]
    MissingBridgedPeer,

    /// The channel already belongs to a conference
    #[error("channel {call_id} already belongs to conference {conference_id}")]
    AlreadyInConference {
        call_id: u32,
        conference_id: ConferenceId,
    },

    /// Conference lookup failed
    #[error("conference {0} not found")]
    ConferenceNotFound(ConferenceId),

    /// Participant lookup failed
    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    /// The configured participant cap was reached
    #[error("conference is full: limit {0}")]
    ConferenceFull(usize),

    /// Media-bridge provider error
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

// Convenience constructors
impl ConferenceError {
    pub fn bridge(msg: impl Into<String>) -> Self {
        ConferenceError::Bridge(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        ConferenceError::Other(msg.into())
    }
}
