//! Device-layer port.
//!
//! Endpoint devices (desk phones) receive conference menus, prompts and key
//! layouts, and originate softkey actions against rendered menus. The
//! signaling transport that carries these payloads is external; the engine
//! talks to devices through [`DeviceEndpoint`] and resolves the device-native
//! channel behind an arbitrary call leg through [`ChannelResolver`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::leg::CallLeg;
use crate::types::{CallDirection, CallPartyInfo, CallState, ConferenceId, ParticipantId};

/// Key layout pushed to a device while one of its calls is conferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// Moderator layout with conference control keys.
    ConnectedConference,
    /// Plain participant layout.
    ConferenceParticipant,
}

/// Softkey action a device can take against a rendered conference menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftkeyAction {
    Invite,
    Exit,
    Mute,
    Kick,
}

impl SoftkeyAction {
    /// Wire name of the action as it appears in softkey URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftkeyAction::Invite => "INVITE",
            SoftkeyAction::Exit => "EXIT",
            SoftkeyAction::Mute => "MUTE",
            SoftkeyAction::Kick => "KICK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INVITE" => Some(SoftkeyAction::Invite),
            "EXIT" => Some(SoftkeyAction::Exit),
            "MUTE" => Some(SoftkeyAction::Mute),
            "KICK" => Some(SoftkeyAction::Kick),
            _ => None,
        }
    }
}

impl fmt::Display for SoftkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device-originated action against a rendered conference menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAction {
    pub app_id: u32,
    pub conference_id: ConferenceId,
    pub call_reference: u32,
    /// Transaction id echoed back from the rendered payload.
    pub transaction_id: u32,
    pub participant_id: ParticipantId,
    pub action: SoftkeyAction,
}

/// Structured payload (menu or form body) pushed to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayloadPush {
    pub app_id: u32,
    pub conference_id: ConferenceId,
    pub call_reference: u32,
    pub transaction_id: u32,
    pub body: String,
}

/// An endpoint device reachable through the signaling transport.
#[async_trait]
pub trait DeviceEndpoint: Send + Sync {
    fn device_id(&self) -> &str;

    /// Line button index for the named line on this device.
    fn line_instance(&self, line_name: &str) -> u8;

    /// Short-lived prompt on the call's display line.
    async fn display_prompt(&self, line_instance: u8, call_id: u32, message: &str, timeout_secs: u8);

    /// Device-wide notification.
    async fn display_notify(&self, message: &str, timeout_secs: u8, priority: u8);

    async fn push_key_layout(&self, line_instance: u8, call_id: u32, layout: KeyLayout);

    async fn push_payload(&self, payload: DevicePayloadPush);

    /// Whether the device currently shows a live conference menu.
    fn conference_menu_live(&self) -> bool;

    fn set_conference_menu_live(&self, live: bool);

    /// Transaction id most recently issued to this device by the renderer.
    fn pending_transaction(&self) -> Option<u32>;

    fn set_pending_transaction(&self, transaction_id: Option<u32>);
}

/// A call leg that belongs to an endpoint device.
pub trait NativeChannel: Send + Sync {
    /// Call identifier unique within the process.
    fn call_id(&self) -> u32;

    fn device(&self) -> Option<Arc<dyn DeviceEndpoint>>;

    /// Name of the line the call sits on; `None` means no native line
    /// association.
    fn line_name(&self) -> Option<String>;

    /// Underlying call leg, if the call is live.
    fn call_leg(&self) -> Option<Arc<dyn CallLeg>>;

    fn call_state(&self) -> CallState;

    fn direction(&self) -> CallDirection;

    fn party_info(&self) -> CallPartyInfo;

    /// Conference this channel currently belongs to, if any.
    fn conference(&self) -> Option<ConferenceId>;

    fn set_conference(&self, conference: Option<ConferenceId>);
}

/// Resolves the device-native channel behind an arbitrary call leg.
pub trait ChannelResolver: Send + Sync {
    /// Returns the native channel owning the leg, or `None` for parties
    /// reached through non-native signaling.
    fn resolve_native_channel(&self, leg: &Arc<dyn CallLeg>) -> Option<Arc<dyn NativeChannel>>;
}
