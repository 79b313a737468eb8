//! Participant record: one call leg's membership within a conference.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bridge::BridgeHandle;
use crate::device::NativeChannel;
use crate::leg::{CallLeg, CodecFormat};
use crate::types::{ExitRoute, ParticipantId};

/// Role of a participant within its conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    Ordinary,
    Moderator,
}

/// Saved pre-conference attachment of a call leg, restored on departure.
#[derive(Debug, Clone)]
pub struct OriginalPath {
    pub bridge: Option<BridgeHandle>,
    pub read_format: CodecFormat,
    pub write_format: CodecFormat,
}

/// One call leg's membership record.
///
/// All fields are interiorly mutable; locks are only held for the duration
/// of a field access, never across an await point. The record is dropped
/// once removed from its conference and the join task has released its
/// reference.
pub struct Participant {
    id: ParticipantId,
    role: RwLock<ParticipantRole>,
    muted: AtomicBool,
    pending_removal: AtomicBool,
    native_channel: RwLock<Option<Arc<dyn NativeChannel>>>,
    bridge_peer: RwLock<Option<Arc<dyn CallLeg>>>,
    original_path: RwLock<Option<OriginalPath>>,
    exit_route: RwLock<Option<ExitRoute>>,
    join_task: Mutex<Option<JoinHandle<()>>>,
    join_started: AtomicBool,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, role: ParticipantRole) -> Arc<Self> {
        let (done_tx, done_rx) = watch::channel(false);
        Arc::new(Self {
            id,
            role: RwLock::new(role),
            muted: AtomicBool::new(false),
            pending_removal: AtomicBool::new(false),
            native_channel: RwLock::new(None),
            bridge_peer: RwLock::new(None),
            original_path: RwLock::new(None),
            exit_route: RwLock::new(None),
            join_task: Mutex::new(None),
            join_started: AtomicBool::new(false),
            done_tx,
            done_rx,
        })
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn role(&self) -> ParticipantRole {
        *self.role.read()
    }

    pub fn is_moderator(&self) -> bool {
        self.role() == ParticipantRole::Moderator
    }

    pub(crate) fn set_role(&self, role: ParticipantRole) {
        *self.role.write() = role;
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Flips the mute flag, returning the new value.
    pub(crate) fn toggle_muted(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn pending_removal(&self) -> bool {
        self.pending_removal.load(Ordering::SeqCst)
    }

    /// Hides the participant from menu rendering before teardown completes.
    pub fn set_pending_removal(&self, pending: bool) {
        self.pending_removal.store(pending, Ordering::SeqCst);
    }

    pub fn native_channel(&self) -> Option<Arc<dyn NativeChannel>> {
        self.native_channel.read().clone()
    }

    pub(crate) fn bind_native_channel(&self, channel: Arc<dyn NativeChannel>) {
        *self.native_channel.write() = Some(channel);
    }

    pub(crate) fn clear_native_channel(&self) {
        *self.native_channel.write() = None;
    }

    /// The leg currently attached (or being attached) to the conference
    /// bridge on this participant's behalf.
    pub fn bridge_peer(&self) -> Option<Arc<dyn CallLeg>> {
        self.bridge_peer.read().clone()
    }

    pub(crate) fn set_bridge_peer(&self, leg: Arc<dyn CallLeg>) {
        *self.bridge_peer.write() = Some(leg);
    }

    pub(crate) fn clear_bridge_peer(&self) {
        *self.bridge_peer.write() = None;
    }

    pub fn original_path(&self) -> Option<OriginalPath> {
        self.original_path.read().clone()
    }

    pub(crate) fn set_original_path(&self, path: OriginalPath) {
        *self.original_path.write() = Some(path);
    }

    pub(crate) fn take_original_path(&self) -> Option<OriginalPath> {
        self.original_path.write().take()
    }

    pub fn exit_route(&self) -> Option<ExitRoute> {
        self.exit_route.read().clone()
    }

    pub(crate) fn set_exit_route(&self, route: ExitRoute) {
        *self.exit_route.write() = Some(route);
    }

    /// Whether the background join task is still running; `false` is the
    /// "none" sentinel the kick path waits for.
    pub fn join_task_active(&self) -> bool {
        self.join_task.lock().is_some()
    }

    /// Marks the join task as launched. Must happen before the task can be
    /// scheduled so that `departed` never misses a running task.
    pub(crate) fn mark_join_started(&self) {
        self.join_started.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_join_task(&self, handle: JoinHandle<()>) {
        let mut task = self.join_task.lock();
        // The task can finish before its handle is recorded; keep the
        // sentinel in that case.
        if !*self.done_rx.borrow() {
            *task = Some(handle);
        }
    }

    /// Clears the join-task handle to its sentinel and fires the completion
    /// signal any kick is waiting on.
    pub(crate) fn finish_join(&self) {
        let mut task = self.join_task.lock();
        let _ = self.done_tx.send(true);
        *task = None;
    }

    /// Resolves once the join task has observed the leg's departure and
    /// completed removal. Returns immediately if no join task was launched.
    pub async fn departed(&self) {
        if !self.join_started.load(Ordering::SeqCst) {
            return;
        }
        let mut done = self.done_rx.clone();
        let _ = done.wait_for(|done| *done).await;
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("role", &self.role())
            .field("muted", &self.is_muted())
            .field("pending_removal", &self.pending_removal())
            .field("join_task_active", &self.join_task_active())
            .finish()
    }
}
