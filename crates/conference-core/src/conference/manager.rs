//! Conference Manager
//!
//! Engine facade: owns the registry and the external ports, and exposes
//! every control operation of the conference core: creation, admission,
//! removal, kick, mute, invite, and device-action dispatch.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeCapabilities, BridgeFlags, MediaBridgePort};
use crate::device::{ChannelResolver, DeviceAction, DeviceEndpoint, NativeChannel, SoftkeyAction};
use crate::display::menu;
use crate::errors::{ConferenceError, Result};
use crate::types::{ConferenceId, ExitRoute, ParticipantId};

use super::events::{ConferenceEvent, ConferenceEventHandler};
use super::participant::{Participant, ParticipantRole};
use super::registry::ConferenceRegistry;
use super::room::{Conference, ConferenceConfig};

/// High-level manager for all conference operations.
pub struct ConferenceManager {
    pub(crate) registry: Arc<ConferenceRegistry>,
    pub(crate) bridge_port: Arc<dyn MediaBridgePort>,
    pub(crate) resolver: Arc<dyn ChannelResolver>,
    /// Event handlers keyed by registration name.
    event_handlers: RwLock<Vec<(String, Arc<dyn ConferenceEventHandler>)>>,
    config: ConferenceConfig,
}

impl ConferenceManager {
    /// Creates a manager with default configuration. Returned behind an
    /// `Arc` because admissions spawn tasks holding a manager reference.
    pub fn new(
        registry: Arc<ConferenceRegistry>,
        bridge_port: Arc<dyn MediaBridgePort>,
        resolver: Arc<dyn ChannelResolver>,
    ) -> Arc<Self> {
        Self::with_config(registry, bridge_port, resolver, ConferenceConfig::default())
    }

    pub fn with_config(
        registry: Arc<ConferenceRegistry>,
        bridge_port: Arc<dyn MediaBridgePort>,
        resolver: Arc<dyn ChannelResolver>,
        config: ConferenceConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            bridge_port,
            resolver,
            event_handlers: RwLock::new(Vec::new()),
            config,
        })
    }

    pub fn registry(&self) -> &Arc<ConferenceRegistry> {
        &self.registry
    }

    /// Looks up a live conference, reporting a typed error on a miss.
    pub fn find_conference(&self, id: ConferenceId) -> Result<Arc<Conference>> {
        self.registry
            .find_by_id(id)
            .ok_or(ConferenceError::ConferenceNotFound(id))
    }

    /// Looks up a participant in a conference, reporting a typed error on a
    /// miss.
    pub fn find_participant(
        &self,
        conference: &Arc<Conference>,
        id: ParticipantId,
    ) -> Result<Arc<Participant>> {
        conference
            .participant_by_id(id)
            .ok_or(ConferenceError::ParticipantNotFound(id))
    }

    /// Add an event handler with a unique name
    pub async fn add_event_handler(&self, name: &str, handler: Arc<dyn ConferenceEventHandler>) {
        let mut handlers = self.event_handlers.write().await;
        handlers.push((name.to_string(), handler));
    }

    /// Remove an event handler by name
    pub async fn remove_event_handler(&self, name: &str) -> bool {
        let mut handlers = self.event_handlers.write().await;
        if let Some(pos) = handlers.iter().position(|(n, _)| n == name) {
            handlers.remove(pos);
            true
        } else {
            false
        }
    }

    async fn publish_event(&self, event: ConferenceEvent) {
        let handlers = self.event_handlers.read().await;
        for (_, handler) in handlers.iter() {
            handler.handle_event(event.clone()).await;
        }
    }

    /// Creates a conference owned by the given channel, which becomes the
    /// moderator.
    ///
    /// The owner must reference a live underlying call leg. If the bridge
    /// provider refuses, the conference is discarded and nothing is
    /// registered.
    pub async fn create_conference(
        &self,
        owner: Arc<dyn NativeChannel>,
    ) -> Result<Arc<Conference>> {
        debug!(call_id = owner.call_id(), "creating conference");

        if owner.call_leg().is_none() {
            warn!(
                call_id = owner.call_id(),
                "owner channel has no underlying call leg"
            );
            return Err(ConferenceError::MissingCallLeg);
        }

        let capabilities = BridgeCapabilities {
            video: self.config.video,
            ..BridgeCapabilities::conference()
        };
        let bridge = self
            .bridge_port
            .create_bridge(capabilities, BridgeFlags::conference())
            .await
            .map_err(|error| {
                warn!(%error, "conference bridge could not be created");
                error
            })?;

        let id = self.registry.allocate_id();
        let conference = Conference::new(id, bridge);

        let moderator = conference.admit(ParticipantRole::Moderator);
        moderator.bind_native_channel(owner.clone());
        conference.set_moderator(Some(moderator));
        owner.set_conference(Some(id));

        self.registry.insert(conference.clone());
        info!(conference = %id, owner = owner.call_id(), "conference created");

        self.publish_event(ConferenceEvent::ConferenceCreated { conference_id: id })
            .await;

        Ok(conference)
    }

    /// Admits the remote party of the channel's current call.
    ///
    /// When the channel is the moderator's own call, both legs are admitted:
    /// the remote party as a fresh participant and the moderator record
    /// (created with the conference) onto its local leg. The caller
    /// serializes the two swaps by holding the call-leg lock across them.
    pub async fn add_participant(
        self: &Arc<Self>,
        conference: &Arc<Conference>,
        channel: Arc<dyn NativeChannel>,
    ) -> Result<()> {
        debug!(
            conference = %conference.id(),
            call_id = channel.call_id(),
            "adding participant"
        );

        let adding_moderator = conference
            .moderator()
            .and_then(|m| m.native_channel())
            .is_some_and(|owner| owner.call_id() == channel.call_id());

        if let Some(existing) = channel.conference() {
            if !adding_moderator {
                info!(
                    call_id = channel.call_id(),
                    conference = %existing,
                    "channel is already in a conference"
                );
                return Err(ConferenceError::AlreadyInConference {
                    call_id: channel.call_id(),
                    conference_id: existing,
                });
            }
        }

        if !channel.call_state().conference_eligible() {
            info!(
                call_id = channel.call_id(),
                state = ?channel.call_state(),
                "only connected or held calls are eligible for a conference"
            );
            return Err(ConferenceError::InvalidChannelState(format!(
                "{:?}",
                channel.call_state()
            )));
        }

        let local_leg = channel.call_leg().ok_or(ConferenceError::MissingCallLeg)?;
        let remote_leg = local_leg
            .bridged_peer()
            .ok_or(ConferenceError::MissingBridgedPeer)?;

        if let Some(limit) = self.config.max_participants {
            if conference.participant_count() >= limit {
                return Err(ConferenceError::ConferenceFull(limit));
            }
        }

        // The remote party always becomes a fresh participant.
        let remote = conference.admit(ParticipantRole::Ordinary);
        remote.set_exit_route(ExitRoute::capture(remote_leg.as_ref()));
        channel.set_conference(Some(conference.id()));

        if adding_moderator {
            debug!("adding remote party of the moderator call");
            self.swap_into_bridge(conference, &remote, remote_leg).await?;

            // The moderator record created with the conference takes the
            // local leg.
            let Some(moderator) = conference.moderator() else {
                return Err(ConferenceError::other("conference has no moderator record"));
            };
            debug!("adding local party of the moderator call");
            moderator.set_exit_route(ExitRoute::capture(local_leg.as_ref()));
            self.swap_into_bridge(conference, &moderator, local_leg)
                .await?;
        } else {
            debug!("adding remote party of an ordinary participant call");
            self.swap_into_bridge(conference, &remote, remote_leg).await?;
        }

        for member in conference.participants() {
            debug!(
                conference = %conference.id(),
                participant = %member.id(),
                "member"
            );
        }

        self.publish_event(ConferenceEvent::ParticipantJoined {
            conference_id: conference.id(),
            participant_id: remote.id(),
        })
        .await;

        self.refresh_moderator_menu(conference).await;
        Ok(())
    }

    /// Removes a participant from the conference.
    ///
    /// No-op unless the participant has an attached bridge peer. Clears the
    /// moderator reference when the moderator itself departs (no automatic
    /// succession), notifies a remaining moderator, and tears the conference
    /// down once the collection is empty.
    pub async fn remove_participant(
        &self,
        conference: &Arc<Conference>,
        participant: &Arc<Participant>,
    ) -> Result<()> {
        if participant.bridge_peer().is_none() {
            return Ok(());
        }

        if conference.is_moderator(participant) {
            conference.set_moderator(None);
        }

        if let Some(moderator) = conference.moderator() {
            if let Some(channel) = moderator.native_channel() {
                if let Some(device) = channel.device() {
                    let instance = channel
                        .line_name()
                        .map(|line| device.line_instance(&line))
                        .unwrap_or(0);
                    info!(
                        conference = %conference.id(),
                        participant = %participant.id(),
                        "leave notification for departing participant"
                    );
                    device
                        .display_prompt(
                            instance,
                            channel.call_id(),
                            &format!("Member #{} left conference.", participant.id()),
                            10,
                        )
                        .await;
                }
            }
        }

        // Clear the conference-side back-reference before the record can be
        // dropped.
        if let Some(channel) = participant.native_channel() {
            channel.set_conference(None);
        }

        let remaining = conference.remove(participant);
        participant.clear_bridge_peer();

        self.publish_event(ConferenceEvent::ParticipantLeft {
            conference_id: conference.id(),
            participant_id: participant.id(),
        })
        .await;

        if remaining == 0 {
            self.end_conference(conference).await?;
        } else {
            self.refresh_moderator_menu(conference).await;
        }
        Ok(())
    }

    /// Removes every participant backed by the given channel.
    pub async fn retract_channel(
        &self,
        conference: &Arc<Conference>,
        channel: &Arc<dyn NativeChannel>,
    ) -> Result<()> {
        let matching: Vec<_> = conference
            .participants()
            .into_iter()
            .filter(|p| {
                p.native_channel()
                    .is_some_and(|c| c.call_id() == channel.call_id())
            })
            .collect();
        for participant in matching {
            self.remove_participant(conference, &participant).await?;
        }
        Ok(())
    }

    /// Tears the conference down: releases every remaining record, destroys
    /// the bridge, and drops the registry entry. Safe to call twice.
    pub async fn end_conference(&self, conference: &Arc<Conference>) -> Result<()> {
        let id = conference.id();
        if self.registry.remove(id).is_none() {
            debug!(conference = %id, "conference already torn down");
            return Ok(());
        }

        for participant in conference.drain_participants() {
            if let Some(channel) = participant.native_channel() {
                channel.set_conference(None);
            }
        }

        if let Err(error) = self.bridge_port.destroy_bridge(conference.bridge()).await {
            warn!(conference = %id, %error, "conference bridge teardown failed");
        }

        info!(conference = %id, "conference ended");
        self.publish_event(ConferenceEvent::ConferenceEnded { conference_id: id })
            .await;
        Ok(())
    }

    /// Kicks a participant: asks the bridge to depart the leg (not hang it
    /// up) and blocks until the join task has observed the departure and
    /// completed removal.
    pub async fn kick_participant(
        &self,
        conference: &Arc<Conference>,
        participant: &Arc<Participant>,
    ) -> Result<()> {
        info!(
            conference = %conference.id(),
            participant = %participant.id(),
            "handling kick"
        );

        // Hide the entry from menus before teardown completes.
        participant.set_pending_removal(true);

        if let Some(channel) = participant.native_channel() {
            if let Some(device) = channel.device() {
                device
                    .display_notify("You have been kicked out of the Conference", 5, 5)
                    .await;
                device
                    .display_prompt(
                        0,
                        channel.call_id(),
                        "You have been kicked out of the Conference",
                        5,
                    )
                    .await;
            }
        }

        let Some(leg) = participant.bridge_peer() else {
            return Err(ConferenceError::other("kick target has no bridge peer"));
        };
        self.bridge_port.depart(conference.bridge(), leg).await?;

        // Block until the join task has finished removal.
        participant.departed().await;

        if participant.native_channel().is_some() {
            if let Some(moderator) = conference.moderator() {
                if let Some(channel) = moderator.native_channel() {
                    if let Some(device) = channel.device() {
                        device
                            .display_notify("Participant has been kicked out", 5, 2)
                            .await;
                        device
                            .display_prompt(
                                0,
                                channel.call_id(),
                                "Participant has been kicked out",
                                2,
                            )
                            .await;
                    }
                }
            }
        }

        info!(
            conference = %conference.id(),
            participant = %participant.id(),
            "participant kicked"
        );
        Ok(())
    }

    /// Flips a participant's mute flag and mirrors it to the bridge.
    pub async fn toggle_mute(
        &self,
        conference: &Arc<Conference>,
        participant: &Arc<Participant>,
    ) -> Result<()> {
        let muted = participant.toggle_muted();
        let label = if muted { "muted" } else { "unmuted" };
        debug!(
            conference = %conference.id(),
            participant = %participant.id(),
            label,
            "toggling mute"
        );

        if let Some(channel) = participant.native_channel() {
            if let Some(device) = channel.device() {
                device.display_notify(label, 5, 5).await;
                device
                    .display_prompt(0, channel.call_id(), label, 5)
                    .await;
            }
        }

        // The effective media mute always mirrors the stored flag.
        if let Some(leg) = participant.bridge_peer() {
            if let Err(error) = self
                .bridge_port
                .set_mute(conference.bridge(), leg, muted)
                .await
            {
                warn!(
                    conference = %conference.id(),
                    participant = %participant.id(),
                    %error,
                    "pushing mute state failed"
                );
            }
        }

        if participant.native_channel().is_some() {
            if let Some(moderator) = conference.moderator() {
                if let Some(channel) = moderator.native_channel() {
                    if let Some(device) = channel.device() {
                        let message = format!("Participant has been {label}");
                        device.display_notify(&message, 5, 2).await;
                        device
                            .display_prompt(0, channel.call_id(), &message, 5)
                            .await;
                    }
                }
            }
        }

        self.publish_event(ConferenceEvent::ParticipantMuted {
            conference_id: conference.id(),
            participant_id: participant.id(),
            muted,
        })
        .await;

        self.refresh_moderator_menu(conference).await;
        Ok(())
    }

    /// Extension point: moderator promotion policy is an integration
    /// decision and intentionally not implemented here.
    pub async fn promote_participant(
        &self,
        _conference: &Arc<Conference>,
        _channel: Arc<dyn NativeChannel>,
    ) -> Result<()> {
        Ok(())
    }

    /// Extension point, counterpart of [`Self::promote_participant`].
    pub async fn demote_participant(
        &self,
        _conference: &Arc<Conference>,
        _channel: Arc<dyn NativeChannel>,
    ) -> Result<()> {
        Ok(())
    }

    /// Pushes the invite form to the channel's device.
    pub async fn invite_participant(
        &self,
        conference: &Arc<Conference>,
        channel: &Arc<dyn NativeChannel>,
    ) -> Result<()> {
        let Some(device) = channel.device() else {
            // Only device-native endpoints get the form.
            return Ok(());
        };
        let Some(render) = menu::render_invite_form(conference, channel) else {
            return Ok(());
        };
        debug!(
            conference = %conference.id(),
            call_id = channel.call_id(),
            "sending invite form"
        );
        let transaction_id = render.transaction_id;
        device
            .push_payload(render.into_payload_push(conference.id()))
            .await;
        device.set_pending_transaction(Some(transaction_id));
        Ok(())
    }

    /// Renders and pushes the participant menu to the channel's device,
    /// recording the issued transaction id and flipping the device's
    /// live-menu flag on first display.
    pub async fn show_conference_list(
        &self,
        conference: &Arc<Conference>,
        channel: &Arc<dyn NativeChannel>,
    ) {
        let Some(device) = channel.device() else {
            return;
        };
        let Some(render) = menu::render_participant_menu(conference, channel) else {
            debug!(conference = %conference.id(), "menu rendering suppressed");
            return;
        };
        debug!(
            conference = %conference.id(),
            call_id = channel.call_id(),
            "sending conference list"
        );
        let transaction_id = render.transaction_id;
        device
            .push_payload(render.into_payload_push(conference.id()))
            .await;
        device.set_pending_transaction(Some(transaction_id));
        if !device.conference_menu_live() {
            device.set_conference_menu_live(true);
        }
    }

    /// Re-renders the moderator's menu when it is currently displayed.
    pub(crate) async fn refresh_moderator_menu(&self, conference: &Arc<Conference>) {
        let Some(moderator) = conference.moderator() else {
            return;
        };
        let Some(channel) = moderator.native_channel() else {
            return;
        };
        let Some(device) = channel.device() else {
            return;
        };
        if device.conference_menu_live() {
            self.show_conference_list(conference, &channel).await;
        }
    }

    /// Dispatches a device-originated softkey action.
    ///
    /// The action's transaction id must match the one most recently issued
    /// to the device; mismatches are dropped. The device's pending-action
    /// state is reset unconditionally.
    pub async fn handle_device_action(
        &self,
        device: &Arc<dyn DeviceEndpoint>,
        action: DeviceAction,
    ) -> Result<()> {
        if device.pending_transaction() != Some(action.transaction_id) {
            debug!(
                device = device.device_id(),
                transaction = action.transaction_id,
                "transaction id does not match the most recently issued one"
            );
            device.set_pending_transaction(None);
            return Ok(());
        }

        debug!(
            device = device.device_id(),
            conference = %action.conference_id,
            participant = %action.participant_id,
            action = %action.action,
            "handling softkey action"
        );

        let result = self.dispatch_action(&action).await;
        device.set_pending_transaction(None);
        result
    }

    async fn dispatch_action(&self, action: &DeviceAction) -> Result<()> {
        let Some(conference) = self.registry.find_by_id(action.conference_id) else {
            return Ok(());
        };

        match action.action {
            SoftkeyAction::Invite => {
                if let Some(channel) = conference.moderator().and_then(|m| m.native_channel()) {
                    self.show_conference_list(&conference, &channel).await;
                    self.invite_participant(&conference, &channel).await?;
                }
            }
            SoftkeyAction::Exit => {
                if let Some(device) = conference
                    .moderator()
                    .and_then(|m| m.native_channel())
                    .and_then(|c| c.device())
                {
                    device.set_conference_menu_live(false);
                }
            }
            SoftkeyAction::Mute | SoftkeyAction::Kick => {
                let Some(participant) = conference.participant_by_id(action.participant_id)
                else {
                    return Ok(());
                };
                if action.action == SoftkeyAction::Mute {
                    self.toggle_mute(&conference, &participant).await?;
                } else {
                    let is_moderator_channel = participant
                        .native_channel()
                        .zip(conference.moderator().and_then(|m| m.native_channel()))
                        .is_some_and(|(target, owner)| target.call_id() == owner.call_id());
                    if is_moderator_channel {
                        debug!(
                            participant = %participant.id(),
                            "refusing to kick the moderator's own record"
                        );
                    } else {
                        self.kick_participant(&conference, &participant).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
