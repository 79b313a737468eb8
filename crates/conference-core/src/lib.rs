//! Conference and participant lifecycle engine for the Quorum call-control
//! server.
//!
//! The engine owns the conference/participant data model, the concurrent
//! "swap into bridge" admission protocol, moderator semantics, kick and
//! mute control flow, and the device-facing menu payloads. Media mixing,
//! device signaling transport, and ordinary-call state machines are
//! external collaborators reached through the port traits in [`bridge`],
//! [`leg`], and [`device`].
//!
//! # Overview
//!
//! The call-control layer creates a [`Conference`](conference::room::Conference)
//! for an owning channel (the initial moderator) and admits further call
//! legs through [`ConferenceManager::add_participant`]. Every admission
//! spawns a background join task that blocks for the leg's bridge tenure;
//! a leg departing the bridge, voluntarily or through
//! [`ConferenceManager::kick_participant`], is restored onto its original
//! path and its membership removed. Devices follow along through icon-menu
//! payloads rendered by [`display::menu`].
//!
//! [`ConferenceManager::add_participant`]: conference::manager::ConferenceManager::add_participant
//! [`ConferenceManager::kick_participant`]: conference::manager::ConferenceManager::kick_participant

pub mod bridge;
pub mod conference;
pub mod device;
pub mod display;
pub mod errors;
pub mod leg;
pub mod types;

pub use bridge::{
    BridgeCapabilities, BridgeFeatures, BridgeFlags, BridgeHandle, MediaBridgePort,
};
pub use conference::events::{ConferenceEvent, ConferenceEventHandler};
pub use conference::manager::ConferenceManager;
pub use conference::participant::{OriginalPath, Participant, ParticipantRole};
pub use conference::registry::ConferenceRegistry;
pub use conference::room::{Conference, ConferenceConfig};
pub use device::{
    ChannelResolver, DeviceAction, DeviceEndpoint, DevicePayloadPush, KeyLayout, NativeChannel,
    SoftkeyAction,
};
pub use errors::{ConferenceError, Result};
pub use leg::{CallLeg, CodecFormat, DialplanLocation, Indication};
pub use types::{
    CallDirection, CallPartyInfo, CallState, ConferenceId, ExitRoute, ParticipantId,
};
