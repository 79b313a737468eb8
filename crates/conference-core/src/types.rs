//! Core identifier and call-metadata types shared across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::leg::CallLeg;

/// Unique identifier of a conference within a running server.
///
/// Ids are handed out by the registry's allocator, monotonically increasing
/// and seeded above a reserved low range. They are never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConferenceId(pub u32);

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of a participant within its conference.
///
/// Assigned at insertion time from the collection size; see the registry
/// module for the id-stability caveats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of the call a channel belongs to, used to pick the identity
/// fields shown on conference menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
    Forwarded,
}

/// Caller/callee identity attached to a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPartyInfo {
    pub calling_name: String,
    pub calling_number: String,
    pub called_name: String,
    pub called_number: String,
    pub original_calling_name: String,
    pub original_calling_number: String,
}

/// Coarse call state of a channel as reported by the call-control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    Initiating,
    Ringing,
    Connected,
    Held,
    Terminated,
}

impl CallState {
    /// Only connected calls or calls on hold may be pulled into a conference.
    pub fn conference_eligible(&self) -> bool {
        matches!(self, CallState::Connected | CallState::Held)
    }
}

/// Dialplan return point a departing leg resumes at after leaving a
/// conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRoute {
    pub context: String,
    pub exten: String,
    pub priority: u32,
}

impl ExitRoute {
    /// Captures the return point from a leg, preferring the macro position
    /// when the leg was reached through one.
    pub fn capture(leg: &dyn CallLeg) -> Self {
        let location = leg.macro_location().unwrap_or_else(|| leg.dialplan_location());
        ExitRoute {
            context: location.context,
            exten: location.exten,
            priority: location.priority,
        }
    }
}
