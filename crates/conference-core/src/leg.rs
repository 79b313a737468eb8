//! Call-leg abstraction consumed by the conference core.
//!
//! A [`CallLeg`] is one endpoint of an active call as the call-control layer
//! sees it. The engine only needs a narrow slice of the full channel
//! surface: where the leg is currently attached, hold/unhold signaling,
//! codec formats, the blocking flag, and the dialplan position to resume at
//! after leaving a conference. Ordinary-call state machines stay outside
//! this crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeHandle;

/// In-band signal sent to a leg around attach/detach transitions.
///
/// The hold / stop / unhold sequence produces a clean transition without
/// audio artifacts when a leg is moved between paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    Hold,
    /// Stop the current indication (the "-1" of the underlying layer).
    Stop,
    Unhold,
}

/// Read/write codec format of a leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecFormat {
    #[default]
    Pcmu,
    Pcma,
    G722,
    G729,
}

/// Position in the dialplan: context, extension, priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialplanLocation {
    pub context: String,
    pub exten: String,
    pub priority: u32,
}

/// One endpoint of an active call.
///
/// Accessors are synchronous snapshots of channel state; only `indicate`
/// reaches out to the signaling layer.
#[async_trait]
pub trait CallLeg: Send + Sync {
    /// Stable identifier of the leg, unique within the process.
    fn leg_id(&self) -> &str;

    /// Bridge or two-party path the leg is currently attached to.
    fn attached_bridge(&self) -> Option<BridgeHandle>;

    /// Attaches the leg to the given path, or detaches it entirely.
    fn attach_bridge(&self, bridge: Option<BridgeHandle>);

    /// Peer leg of the current two-party call, if any.
    fn bridged_peer(&self) -> Option<Arc<dyn CallLeg>>;

    /// Sends an in-band indication to the leg.
    async fn indicate(&self, indication: Indication);

    fn read_format(&self) -> CodecFormat;

    fn write_format(&self) -> CodecFormat;

    fn set_formats(&self, read: CodecFormat, write: CodecFormat);

    /// Whether a task is (or may be) blocking on this leg.
    fn is_blocking(&self) -> bool;

    fn set_blocking(&self, blocking: bool);

    /// Whether a call-control session is attached to the leg, making it
    /// eligible for the blocking flag.
    fn has_active_session(&self) -> bool;

    /// Plain dialplan position of the leg.
    fn dialplan_location(&self) -> DialplanLocation;

    /// Macro position, when the leg was reached through a dialplan macro.
    fn macro_location(&self) -> Option<DialplanLocation>;
}
