//! Admission protocol: swapping a call leg onto the conference bridge.
//!
//! Admission detaches a leg from its current path, then hands it to a
//! background join task that blocks for the leg's entire bridge tenure.
//! Restoration of the original path happens strictly after the task has
//! observed the leg's departure, never right after launch, so a leg is
//! always attached to exactly one of its original path or the bridge.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bridge::BridgeFeatures;
use crate::device::KeyLayout;
use crate::errors::Result;
use crate::leg::{CallLeg, Indication};

use super::manager::ConferenceManager;
use super::participant::{OriginalPath, Participant};
use super::room::Conference;

impl ConferenceManager {
    /// Moves one call leg from its current path onto the conference bridge.
    ///
    /// Returns as soon as the background join task is launched; the join
    /// itself blocks inside the task, so admission is non-blocking for the
    /// caller. `bridge_peer` and the saved original path are fully recorded
    /// before the task can be scheduled.
    pub(crate) async fn swap_into_bridge(
        self: &Arc<Self>,
        conference: &Arc<Conference>,
        participant: &Arc<Participant>,
        leg: Arc<dyn CallLeg>,
    ) -> Result<()> {
        debug!(
            conference = %conference.id(),
            participant = %participant.id(),
            leg = leg.leg_id(),
            "swapping leg onto conference bridge"
        );

        if leg.has_active_session() {
            // A task is about to block on this leg.
            leg.set_blocking(true);
        }

        participant.set_bridge_peer(leg.clone());
        participant.set_original_path(OriginalPath {
            bridge: leg.attached_bridge(),
            read_format: leg.read_format(),
            write_format: leg.write_format(),
        });

        if participant.native_channel().is_none() {
            match self.resolver.resolve_native_channel(&leg) {
                Some(channel) if channel.device().is_some() && channel.line_name().is_some() => {
                    info!(
                        participant = %participant.id(),
                        call_id = channel.call_id(),
                        "member is a device-native channel"
                    );
                    channel.set_conference(Some(conference.id()));
                    participant.bind_native_channel(channel);
                }
                _ => {
                    info!(
                        participant = %participant.id(),
                        "member joins through non-native signaling"
                    );
                    participant.clear_native_channel();
                }
            }
        } else {
            debug!(
                participant = %participant.id(),
                "participant already carries a native channel; assuming moderator leg"
            );
        }

        // Hold, detach, unhold: a clean transition without audio artifacts.
        leg.indicate(Indication::Hold).await;
        leg.attach_bridge(None);
        leg.indicate(Indication::Stop).await;
        leg.indicate(Indication::Unhold).await;

        participant.mark_join_started();
        let manager = Arc::clone(self);
        let task_conference = Arc::clone(conference);
        let task_participant = Arc::clone(participant);
        let handle = tokio::spawn(async move {
            manager.join_task(task_conference, task_participant).await;
        });
        participant.set_join_task(handle);

        Ok(())
    }

    /// Per-participant bridge tenure.
    ///
    /// Blocks on the bridge join primitive until the leg is removed or
    /// departs, then restores the leg's original path and removes the
    /// participant. A join failure takes the same restoration path: the leg
    /// is rolled back onto its original path and the membership dropped.
    async fn join_task(self: Arc<Self>, conference: Arc<Conference>, participant: Arc<Participant>) {
        debug!(
            conference = %conference.id(),
            participant = %participant.id(),
            "entering join task"
        );

        let Some(leg) = participant.bridge_peer() else {
            warn!(
                participant = %participant.id(),
                "join task started without a bridge peer"
            );
            participant.finish_join();
            return;
        };

        if let Some(channel) = participant.native_channel() {
            if let Some(device) = channel.device() {
                let instance = channel
                    .line_name()
                    .map(|line| device.line_instance(&line))
                    .unwrap_or(0);
                if participant.is_moderator() {
                    device
                        .push_key_layout(instance, channel.call_id(), KeyLayout::ConnectedConference)
                        .await;
                    device
                        .display_prompt(instance, channel.call_id(), "Started Conference", 10)
                        .await;
                } else {
                    device
                        .push_key_layout(instance, channel.call_id(), KeyLayout::ConferenceParticipant)
                        .await;
                    device
                        .display_prompt(instance, channel.call_id(), "Entered Conference", 10)
                        .await;
                }
            }
        }

        let features = BridgeFeatures {
            mute: participant.is_muted(),
        };
        info!(
            conference = %conference.id(),
            participant = %participant.id(),
            "entering bridge join"
        );
        if let Err(error) = self
            .bridge_port
            .join(conference.bridge(), leg.clone(), features)
            .await
        {
            warn!(
                conference = %conference.id(),
                participant = %participant.id(),
                %error,
                "bridge join failed; rolling leg back onto its original path"
            );
        }
        info!(
            conference = %conference.id(),
            participant = %participant.id(),
            "leaving bridge join"
        );

        restore_original_path(&participant, leg.as_ref()).await;

        if let Err(error) = self.remove_participant(&conference, &participant).await {
            warn!(
                conference = %conference.id(),
                participant = %participant.id(),
                %error,
                "removal after departure failed"
            );
        }

        participant.finish_join();
    }
}

/// Re-attaches a departed leg to its saved pre-conference path and restores
/// the original formats.
async fn restore_original_path(participant: &Arc<Participant>, leg: &dyn CallLeg) {
    debug!(
        participant = %participant.id(),
        leg = leg.leg_id(),
        "reconnecting leg to its original path"
    );
    let Some(path) = participant.take_original_path() else {
        leg.set_blocking(false);
        return;
    };
    leg.indicate(Indication::Hold).await;
    leg.attach_bridge(path.bridge);
    leg.set_formats(path.read_format, path.write_format);
    leg.indicate(Indication::Stop).await;
    leg.indicate(Indication::Unhold).await;
    leg.set_blocking(false);
}
