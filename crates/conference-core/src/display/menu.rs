//! Structured device payloads describing conference state.
//!
//! Two payloads exist: the participant icon menu and the invite input form.
//! Both are typed first and rendered to the device wire format second, and
//! both carry a per-render random transaction id that devices echo back in
//! softkey actions. Rendering is pure; the caller records the issued
//! transaction id and flips the device's live-menu flag.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conference::participant::{Participant, ParticipantRole};
use crate::conference::room::Conference;
use crate::device::{DevicePayloadPush, NativeChannel, SoftkeyAction};
use crate::types::{CallDirection, ConferenceId};

/// Application id carried by every conference payload and softkey action.
pub const CONFERENCE_APP_ID: u32 = 9999;

/// Call reference is fixed until per-call references are threaded through
/// from the signaling layer.
pub const CALL_REFERENCE: u32 = 1;

pub const ICON_MODERATOR: u8 = 0;
pub const ICON_MODERATOR_MUTED: u8 = 1;
pub const ICON_PARTICIPANT: u8 = 2;
pub const ICON_PARTICIPANT_MUTED: u8 = 3;

/// 16x10, 2 bits per pixel glyphs pushed with every icon menu, indexed by
/// the icon constants above. Wire constants, do not edit.
const ICON_GLYPHS: [&str; 4] = [
    "000F0000C03F3000C03FF000C03FF003000FF00FFCFFF30FFCFFF303CC3FF300CC3F330000000000",
    "000F0000C03FF03CC03FF03CC03FF03C000FF03CFCFFF33CFCFFF33CCC3FF33CCC3FF33C00000000",
    "000F0000C0303000C030F000C030F003000FF00FFCF0F30F0C00F303CC30F300CC30330000000000",
    "000F0000C030F03CC030F03CC030F03C000FF03CFCF0F33C0C00F33CCC30F33CCC30F33C00000000",
];

/// Picks the icon index for a role/mute combination.
pub fn icon_for(role: ParticipantRole, muted: bool) -> u8 {
    let base = match role {
        ParticipantRole::Moderator => ICON_MODERATOR,
        ParticipantRole::Ordinary => ICON_PARTICIPANT,
    };
    if muted {
        base + 1
    } else {
        base
    }
}

/// One participant entry on the icon menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub icon_index: u8,
    pub label: String,
    /// `UserCallData:appId:conferenceId:callReference:transactionId:participantId`
    pub action_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftkeyItem {
    pub name: String,
    pub position: u8,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconItem {
    pub index: u8,
    pub height: u8,
    pub width: u8,
    pub depth: u8,
    pub data: String,
}

/// Participant menu payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconMenu {
    pub title: String,
    pub prompt: String,
    pub items: Vec<MenuItem>,
    pub softkeys: Vec<SoftkeyItem>,
    pub icons: Vec<IconItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub display_name: String,
    pub query_param: String,
    /// 'A' for alphabetic input, 'N' for numeric.
    pub input_flags: char,
}

/// Invite form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputForm {
    pub title: String,
    pub prompt: String,
    pub fields: Vec<InputField>,
    pub softkeys: Vec<SoftkeyItem>,
}

/// A rendered payload body plus the transaction id minted for it.
#[derive(Debug, Clone)]
pub struct RenderedPayload {
    pub transaction_id: u32,
    pub body: String,
}

impl RenderedPayload {
    pub fn into_payload_push(self, conference_id: ConferenceId) -> DevicePayloadPush {
        DevicePayloadPush {
            app_id: CONFERENCE_APP_ID,
            conference_id,
            call_reference: CALL_REFERENCE,
            transaction_id: self.transaction_id,
            body: self.body,
        }
    }
}

/// Builds the participant menu for a requesting channel.
///
/// Returns `None` when the conference has a moderator but an empty
/// collection, a transient teardown state with nothing to show.
pub fn render_participant_menu(
    conference: &Conference,
    requester: &Arc<dyn NativeChannel>,
) -> Option<RenderedPayload> {
    let participants = conference.participants();
    if conference.moderator().is_some() && participants.is_empty() {
        return None;
    }

    let transaction_id: u32 = rand::random();
    let conference_id = conference.id();

    let mut items = Vec::new();
    for participant in &participants {
        if participant.pending_removal() {
            continue;
        }
        items.push(MenuItem {
            icon_index: icon_for(participant.role(), participant.is_muted()),
            label: participant_label(participant),
            action_url: format!(
                "UserCallData:{}:{}:{}:{}:{}",
                CONFERENCE_APP_ID,
                conference_id,
                CALL_REFERENCE,
                transaction_id,
                participant.id()
            ),
        });
    }

    let requester_is_moderator = conference
        .moderator()
        .and_then(|m| m.native_channel())
        .is_some_and(|owner| owner.call_id() == requester.call_id());

    let mut softkeys = Vec::new();
    if requester_is_moderator {
        softkeys.push(action_softkey("Invite", 1, SoftkeyAction::Invite, conference_id, transaction_id));
        softkeys.push(action_softkey("Mute", 2, SoftkeyAction::Mute, conference_id, transaction_id));
        softkeys.push(action_softkey("Kick", 3, SoftkeyAction::Kick, conference_id, transaction_id));
    }
    softkeys.push(SoftkeyItem {
        name: "Exit".to_string(),
        position: 4,
        url: "SoftKey:Exit".to_string(),
    });

    let menu = IconMenu {
        title: "Conference List".to_string(),
        prompt: "Make Your Selection".to_string(),
        items,
        softkeys,
        icons: icon_table(),
    };

    Some(RenderedPayload {
        transaction_id,
        body: menu.to_xml(),
    })
}

/// Builds the invite form for a requesting channel.
///
/// Suppressed in the same transient teardown state as the menu, unless the
/// requester is the moderator's own channel.
pub fn render_invite_form(
    conference: &Conference,
    requester: &Arc<dyn NativeChannel>,
) -> Option<RenderedPayload> {
    let moderator_channel = conference.moderator().and_then(|m| m.native_channel());
    let requester_is_moderator = moderator_channel
        .as_ref()
        .is_some_and(|owner| owner.call_id() == requester.call_id());
    if conference.moderator().is_some()
        && conference.participant_count() == 0
        && !requester_is_moderator
    {
        return None;
    }

    let transaction_id: u32 = rand::random();

    let form = InputForm {
        title: "Invite to Conference".to_string(),
        prompt: "Enter the name/number to Dial".to_string(),
        fields: vec![
            InputField {
                display_name: "Name".to_string(),
                query_param: "Name".to_string(),
                input_flags: 'A',
            },
            InputField {
                display_name: "Number".to_string(),
                query_param: "Number".to_string(),
                input_flags: 'N',
            },
        ],
        softkeys: vec![
            SoftkeyItem {
                name: "Submit".to_string(),
                position: 1,
                url: format!(
                    "UserDataSoftKey:Submit:1:INVITE1${}${}${}$",
                    CONFERENCE_APP_ID,
                    conference.id(),
                    transaction_id
                ),
            },
            SoftkeyItem {
                name: "Cancel".to_string(),
                position: 3,
                url: "SoftKey:Cancel".to_string(),
            },
        ],
    };

    Some(RenderedPayload {
        transaction_id,
        body: form.to_xml(),
    })
}

fn action_softkey(
    name: &str,
    position: u8,
    action: SoftkeyAction,
    conference_id: ConferenceId,
    transaction_id: u32,
) -> SoftkeyItem {
    SoftkeyItem {
        name: name.to_string(),
        position,
        url: format!(
            "UserDataSoftKey:Select:{}:{}${}${}${}$",
            position,
            action.as_str(),
            CONFERENCE_APP_ID,
            conference_id,
            transaction_id
        ),
    }
}

/// Display label for a participant entry, derived from the call-direction
/// specific identity fields.
fn participant_label(participant: &Arc<Participant>) -> String {
    match participant.native_channel() {
        Some(channel) => {
            let info = channel.party_info();
            let (name, number) = match channel.direction() {
                CallDirection::Inbound => (info.called_name, info.called_number),
                CallDirection::Outbound => (info.calling_name, info.calling_number),
                CallDirection::Forwarded => {
                    (info.original_calling_name, info.original_calling_number)
                }
            };
            format!("{}:{} ({})", participant.id(), name, number)
        }
        None => format!("{}:Unknown Name (Unknown Number)", participant.id()),
    }
}

fn icon_table() -> Vec<IconItem> {
    ICON_GLYPHS
        .iter()
        .enumerate()
        .map(|(index, data)| IconItem {
            index: index as u8,
            height: 10,
            width: 16,
            depth: 2,
            data: (*data).to_string(),
        })
        .collect()
}

impl IconMenu {
    /// Renders the menu to the device wire format.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(2048);
        xml.push_str("<CiscoIPPhoneIconMenu>\n");
        let _ = writeln!(xml, "<Title>{}</Title>", self.title);
        let _ = writeln!(xml, "<Prompt>{}</Prompt>", self.prompt);
        for item in &self.items {
            xml.push_str("<MenuItem>\n");
            let _ = writeln!(xml, "  <IconIndex>{}</IconIndex>", item.icon_index);
            let _ = writeln!(xml, "  <Name>{}</Name>", item.label);
            let _ = writeln!(xml, "  <URL>{}</URL>", item.action_url);
            xml.push_str("</MenuItem>\n");
        }
        for softkey in &self.softkeys {
            softkey.write_xml(&mut xml);
        }
        for icon in &self.icons {
            xml.push_str("<IconItem>\n");
            let _ = writeln!(xml, "  <Index>{}</Index>", icon.index);
            let _ = writeln!(xml, "  <Height>{}</Height>", icon.height);
            let _ = writeln!(xml, "  <Width>{}</Width>", icon.width);
            let _ = writeln!(xml, "  <Depth>{}</Depth>", icon.depth);
            let _ = writeln!(xml, "  <Data>{}</Data>", icon.data);
            xml.push_str("</IconItem>\n");
        }
        xml.push_str("</CiscoIPPhoneIconMenu>\n");
        xml
    }
}

impl InputForm {
    /// Renders the form to the device wire format.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str("<CiscoIPPhoneInput>\n");
        let _ = writeln!(xml, "    <Title>{}</Title>", self.title);
        let _ = writeln!(xml, "    <Prompt>{}</Prompt>", self.prompt);
        for field in &self.fields {
            xml.push_str("    <InputItem>\n");
            let _ = writeln!(xml, "          <DisplayName>{}</DisplayName>", field.display_name);
            let _ = writeln!(xml, "          <QueryStringParam>{}</QueryStringParam>", field.query_param);
            let _ = writeln!(xml, "          <InputFlags>{}</InputFlags>", field.input_flags);
            xml.push_str("    </InputItem>\n");
        }
        for softkey in &self.softkeys {
            softkey.write_xml(&mut xml);
        }
        xml.push_str("</CiscoIPPhoneInput>\n");
        xml
    }
}

impl SoftkeyItem {
    fn write_xml(&self, xml: &mut String) {
        xml.push_str("<SoftKeyItem>\n");
        let _ = writeln!(xml, "  <Name>{}</Name>", self.name);
        let _ = writeln!(xml, "  <Position>{}</Position>", self.position);
        let _ = writeln!(xml, "  <URL>{}</URL>", self.url);
        xml.push_str("</SoftKeyItem>\n");
    }
}
