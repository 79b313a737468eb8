#![allow(dead_code)]

//! In-memory fakes for the engine's ports, shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use quorum_conference_core::{
    BridgeCapabilities, BridgeFeatures, BridgeFlags, BridgeHandle, CallDirection, CallLeg,
    CallPartyInfo, CallState, ChannelResolver, CodecFormat, ConferenceError, ConferenceId,
    ConferenceManager, ConferenceRegistry, DeviceEndpoint, DevicePayloadPush, DialplanLocation,
    Indication, KeyLayout, MediaBridgePort, NativeChannel, Result,
};

/// Polls a condition until it holds or the test times out.
pub async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

// ---------------------------------------------------------------------------
// Bridge port
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBridge {
    members: HashMap<String, Arc<Notify>>,
}

/// Media-bridge fake: `join` parks the caller on a notify until `depart`
/// releases it.
pub struct FakeBridgePort {
    pub fail_create: AtomicBool,
    pub fail_join: AtomicBool,
    bridges: Mutex<HashMap<String, FakeBridge>>,
    /// (bridge, leg, muted) log in push order.
    pub mute_pushes: Mutex<Vec<(String, String, bool)>>,
    pub destroyed: Mutex<Vec<String>>,
}

impl FakeBridgePort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_create: AtomicBool::new(false),
            fail_join: AtomicBool::new(false),
            bridges: Mutex::new(HashMap::new()),
            mute_pushes: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        })
    }

    pub fn member_count(&self, bridge: &BridgeHandle) -> usize {
        self.bridges
            .lock()
            .get(bridge.as_str())
            .map(|b| b.members.len())
            .unwrap_or(0)
    }

    pub fn has_member(&self, bridge: &BridgeHandle, leg_id: &str) -> bool {
        self.bridges
            .lock()
            .get(bridge.as_str())
            .is_some_and(|b| b.members.contains_key(leg_id))
    }

    pub async fn wait_for_member(&self, bridge: &BridgeHandle, leg_id: &str) {
        let bridge = bridge.clone();
        let leg_id = leg_id.to_string();
        wait_until(
            || self.has_member(&bridge, &leg_id),
            &format!("leg {leg_id} to join the bridge"),
        )
        .await;
    }

    pub fn last_mute_for(&self, leg_id: &str) -> Option<bool> {
        self.mute_pushes
            .lock()
            .iter()
            .rev()
            .find(|(_, leg, _)| leg == leg_id)
            .map(|(_, _, muted)| *muted)
    }
}

#[async_trait]
impl MediaBridgePort for FakeBridgePort {
    async fn create_bridge(
        &self,
        _capabilities: BridgeCapabilities,
        _flags: BridgeFlags,
    ) -> Result<BridgeHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ConferenceError::bridge("bridge refused"));
        }
        let handle = BridgeHandle::new();
        self.bridges
            .lock()
            .insert(handle.as_str().to_string(), FakeBridge::default());
        Ok(handle)
    }

    async fn join(
        &self,
        bridge: &BridgeHandle,
        leg: Arc<dyn CallLeg>,
        _features: BridgeFeatures,
    ) -> Result<()> {
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(ConferenceError::bridge("join refused"));
        }
        let notify = Arc::new(Notify::new());
        {
            let mut bridges = self.bridges.lock();
            let entry = bridges.entry(bridge.as_str().to_string()).or_default();
            entry
                .members
                .insert(leg.leg_id().to_string(), notify.clone());
        }
        notify.notified().await;
        if let Some(entry) = self.bridges.lock().get_mut(bridge.as_str()) {
            entry.members.remove(leg.leg_id());
        }
        Ok(())
    }

    async fn depart(&self, bridge: &BridgeHandle, leg: Arc<dyn CallLeg>) -> Result<()> {
        let notify = self
            .bridges
            .lock()
            .get(bridge.as_str())
            .and_then(|b| b.members.get(leg.leg_id()).cloned());
        match notify {
            Some(notify) => {
                notify.notify_one();
                Ok(())
            }
            None => Err(ConferenceError::bridge("leg not on bridge")),
        }
    }

    async fn set_mute(
        &self,
        bridge: &BridgeHandle,
        leg: Arc<dyn CallLeg>,
        muted: bool,
    ) -> Result<()> {
        self.mute_pushes.lock().push((
            bridge.as_str().to_string(),
            leg.leg_id().to_string(),
            muted,
        ));
        Ok(())
    }

    async fn destroy_bridge(&self, bridge: &BridgeHandle) -> Result<()> {
        self.bridges.lock().remove(bridge.as_str());
        self.destroyed.lock().push(bridge.as_str().to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Call legs
// ---------------------------------------------------------------------------

pub struct FakeLeg {
    id: String,
    bridge: Mutex<Option<BridgeHandle>>,
    peer: Mutex<Option<Arc<dyn CallLeg>>>,
    blocking: AtomicBool,
    active_session: bool,
    pub indications: Mutex<Vec<Indication>>,
    formats: Mutex<(CodecFormat, CodecFormat)>,
    location: DialplanLocation,
    macro_location: Option<DialplanLocation>,
}

impl FakeLeg {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            bridge: Mutex::new(None),
            peer: Mutex::new(None),
            blocking: AtomicBool::new(false),
            active_session: true,
            indications: Mutex::new(Vec::new()),
            formats: Mutex::new((CodecFormat::G722, CodecFormat::Pcma)),
            location: DialplanLocation {
                context: "default".to_string(),
                exten: "s".to_string(),
                priority: 1,
            },
            macro_location: None,
        })
    }

    pub fn with_macro(id: &str, context: &str, exten: &str, priority: u32) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            bridge: Mutex::new(None),
            peer: Mutex::new(None),
            blocking: AtomicBool::new(false),
            active_session: true,
            indications: Mutex::new(Vec::new()),
            formats: Mutex::new((CodecFormat::G722, CodecFormat::Pcma)),
            location: DialplanLocation {
                context: "default".to_string(),
                exten: "s".to_string(),
                priority: 1,
            },
            macro_location: Some(DialplanLocation {
                context: context.to_string(),
                exten: exten.to_string(),
                priority,
            }),
        })
    }

    /// Bridges two legs into a two-party call sharing a path handle.
    pub fn pair(a: &Arc<FakeLeg>, b: &Arc<FakeLeg>) -> BridgeHandle {
        let path = BridgeHandle::new();
        *a.bridge.lock() = Some(path.clone());
        *b.bridge.lock() = Some(path.clone());
        let peer_of_a: Arc<dyn CallLeg> = b.clone();
        let peer_of_b: Arc<dyn CallLeg> = a.clone();
        *a.peer.lock() = Some(peer_of_a);
        *b.peer.lock() = Some(peer_of_b);
        path
    }
}

#[async_trait]
impl CallLeg for FakeLeg {
    fn leg_id(&self) -> &str {
        &self.id
    }

    fn attached_bridge(&self) -> Option<BridgeHandle> {
        self.bridge.lock().clone()
    }

    fn attach_bridge(&self, bridge: Option<BridgeHandle>) {
        *self.bridge.lock() = bridge;
    }

    fn bridged_peer(&self) -> Option<Arc<dyn CallLeg>> {
        self.peer.lock().clone()
    }

    async fn indicate(&self, indication: Indication) {
        self.indications.lock().push(indication);
    }

    fn read_format(&self) -> CodecFormat {
        self.formats.lock().0
    }

    fn write_format(&self) -> CodecFormat {
        self.formats.lock().1
    }

    fn set_formats(&self, read: CodecFormat, write: CodecFormat) {
        *self.formats.lock() = (read, write);
    }

    fn is_blocking(&self) -> bool {
        self.blocking.load(Ordering::SeqCst)
    }

    fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::SeqCst);
    }

    fn has_active_session(&self) -> bool {
        self.active_session
    }

    fn dialplan_location(&self) -> DialplanLocation {
        self.location.clone()
    }

    fn macro_location(&self) -> Option<DialplanLocation> {
        self.macro_location.clone()
    }
}

// ---------------------------------------------------------------------------
// Devices and channels
// ---------------------------------------------------------------------------

pub struct FakeDevice {
    id: String,
    pub prompts: Mutex<Vec<String>>,
    pub notifies: Mutex<Vec<String>>,
    pub key_layouts: Mutex<Vec<KeyLayout>>,
    pub payloads: Mutex<Vec<DevicePayloadPush>>,
    menu_live: AtomicBool,
    pending_transaction: Mutex<Option<u32>>,
}

impl FakeDevice {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            prompts: Mutex::new(Vec::new()),
            notifies: Mutex::new(Vec::new()),
            key_layouts: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            menu_live: AtomicBool::new(false),
            pending_transaction: Mutex::new(None),
        })
    }

    pub fn prompt_seen(&self, needle: &str) -> bool {
        self.prompts.lock().iter().any(|p| p.contains(needle))
    }

    pub fn notify_seen(&self, needle: &str) -> bool {
        self.notifies.lock().iter().any(|n| n.contains(needle))
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.lock().len()
    }

    pub fn last_payload(&self) -> Option<DevicePayloadPush> {
        self.payloads.lock().last().cloned()
    }
}

#[async_trait]
impl DeviceEndpoint for FakeDevice {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn line_instance(&self, _line_name: &str) -> u8 {
        1
    }

    async fn display_prompt(
        &self,
        _line_instance: u8,
        _call_id: u32,
        message: &str,
        _timeout_secs: u8,
    ) {
        self.prompts.lock().push(message.to_string());
    }

    async fn display_notify(&self, message: &str, _timeout_secs: u8, _priority: u8) {
        self.notifies.lock().push(message.to_string());
    }

    async fn push_key_layout(&self, _line_instance: u8, _call_id: u32, layout: KeyLayout) {
        self.key_layouts.lock().push(layout);
    }

    async fn push_payload(&self, payload: DevicePayloadPush) {
        self.payloads.lock().push(payload);
    }

    fn conference_menu_live(&self) -> bool {
        self.menu_live.load(Ordering::SeqCst)
    }

    fn set_conference_menu_live(&self, live: bool) {
        self.menu_live.store(live, Ordering::SeqCst);
    }

    fn pending_transaction(&self) -> Option<u32> {
        *self.pending_transaction.lock()
    }

    fn set_pending_transaction(&self, transaction_id: Option<u32>) {
        *self.pending_transaction.lock() = transaction_id;
    }
}

pub struct FakeChannel {
    call_id: u32,
    line: Option<String>,
    device: Option<Arc<FakeDevice>>,
    leg: Option<Arc<FakeLeg>>,
    pub state: Mutex<CallState>,
    direction: CallDirection,
    info: CallPartyInfo,
    conference: Mutex<Option<ConferenceId>>,
}

impl FakeChannel {
    pub fn new(
        call_id: u32,
        line: Option<&str>,
        device: Option<Arc<FakeDevice>>,
        leg: Option<Arc<FakeLeg>>,
        direction: CallDirection,
        info: CallPartyInfo,
    ) -> Arc<Self> {
        Arc::new(Self {
            call_id,
            line: line.map(str::to_string),
            device,
            leg,
            state: Mutex::new(CallState::Connected),
            direction,
            info,
            conference: Mutex::new(None),
        })
    }

    pub fn set_state(&self, state: CallState) {
        *self.state.lock() = state;
    }
}

impl NativeChannel for FakeChannel {
    fn call_id(&self) -> u32 {
        self.call_id
    }

    fn device(&self) -> Option<Arc<dyn DeviceEndpoint>> {
        self.device
            .clone()
            .map(|device| device as Arc<dyn DeviceEndpoint>)
    }

    fn line_name(&self) -> Option<String> {
        self.line.clone()
    }

    fn call_leg(&self) -> Option<Arc<dyn CallLeg>> {
        self.leg.clone().map(|leg| leg as Arc<dyn CallLeg>)
    }

    fn call_state(&self) -> CallState {
        *self.state.lock()
    }

    fn direction(&self) -> CallDirection {
        self.direction
    }

    fn party_info(&self) -> CallPartyInfo {
        self.info.clone()
    }

    fn conference(&self) -> Option<ConferenceId> {
        *self.conference.lock()
    }

    fn set_conference(&self, conference: Option<ConferenceId>) {
        *self.conference.lock() = conference;
    }
}

/// Maps leg ids to the native channels behind them.
pub struct FakeResolver {
    map: Mutex<HashMap<String, Arc<dyn NativeChannel>>>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            map: Mutex::new(HashMap::new()),
        })
    }

    pub fn register(&self, leg_id: &str, channel: Arc<dyn NativeChannel>) {
        self.map.lock().insert(leg_id.to_string(), channel);
    }
}

impl ChannelResolver for FakeResolver {
    fn resolve_native_channel(&self, leg: &Arc<dyn CallLeg>) -> Option<Arc<dyn NativeChannel>> {
        self.map.lock().get(leg.leg_id()).cloned()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub manager: Arc<ConferenceManager>,
    pub bridge: Arc<FakeBridgePort>,
    pub resolver: Arc<FakeResolver>,
}

/// Makes engine traces visible under `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn harness() -> TestHarness {
    init_tracing();
    let bridge = FakeBridgePort::new();
    let resolver = FakeResolver::new();
    let manager = ConferenceManager::new(
        Arc::new(ConferenceRegistry::new()),
        bridge.clone(),
        resolver.clone(),
    );
    TestHarness {
        manager,
        bridge,
        resolver,
    }
}

/// All six identity fields set to the same name/number pair.
pub fn party_info(name: &str, number: &str) -> CallPartyInfo {
    CallPartyInfo {
        calling_name: name.to_string(),
        calling_number: number.to_string(),
        called_name: name.to_string(),
        called_number: number.to_string(),
        original_calling_name: name.to_string(),
        original_calling_number: number.to_string(),
    }
}

/// A device-backed call: channel on its own device, local leg bridged to a
/// remote leg.
pub struct CallSetup {
    pub channel: Arc<FakeChannel>,
    pub device: Arc<FakeDevice>,
    pub local_leg: Arc<FakeLeg>,
    pub remote_leg: Arc<FakeLeg>,
    /// Pre-conference two-party path shared by the legs.
    pub original_path: BridgeHandle,
}

pub fn device_call(call_id: u32, name: &str, number: &str) -> CallSetup {
    let device = FakeDevice::new(&format!("SEP{call_id:012}"));
    let local_leg = FakeLeg::new(&format!("leg-local-{call_id}"));
    let remote_leg = FakeLeg::new(&format!("leg-remote-{call_id}"));
    let original_path = FakeLeg::pair(&local_leg, &remote_leg);
    let channel = FakeChannel::new(
        call_id,
        Some("101"),
        Some(device.clone()),
        Some(local_leg.clone()),
        CallDirection::Outbound,
        party_info(name, number),
    );
    CallSetup {
        channel,
        device,
        local_leg,
        remote_leg,
        original_path,
    }
}

/// Registers a native remote party for the call's remote leg, with its own
/// device.
pub fn register_remote_party(
    harness: &TestHarness,
    call: &CallSetup,
    remote_call_id: u32,
    name: &str,
    number: &str,
    direction: CallDirection,
) -> (Arc<FakeChannel>, Arc<FakeDevice>) {
    let device = FakeDevice::new(&format!("SEP{remote_call_id:012}"));
    let channel = FakeChannel::new(
        remote_call_id,
        Some("201"),
        Some(device.clone()),
        Some(call.remote_leg.clone()),
        direction,
        party_info(name, number),
    );
    let native: Arc<dyn NativeChannel> = channel.clone();
    harness.resolver.register(call.remote_leg.leg_id(), native);
    (channel, device)
}
