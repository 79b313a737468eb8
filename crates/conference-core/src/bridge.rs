//! Media-bridge port.
//!
//! The mixing resource itself (codecs, RTP, mixing topology) lives outside
//! this crate; the engine only creates bridges, joins and departs legs, and
//! pushes per-leg mute state through this trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::leg::CallLeg;

/// Opaque handle to a media bridge owned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeHandle(pub String);

impl BridgeHandle {
    /// Create a new unique bridge handle
    pub fn new() -> Self {
        Self(format!("bridge_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mixing capabilities requested when a bridge is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCapabilities {
    /// Multi-party mixing rather than a 1:1 path.
    pub multi_mix: bool,
    pub multi_threaded: bool,
    /// Run the bridge on its own dedicated thread.
    pub dedicated_thread: bool,
    pub video: bool,
}

impl BridgeCapabilities {
    /// Capability set requested for conference bridges.
    pub fn conference() -> Self {
        Self {
            multi_mix: true,
            multi_threaded: true,
            dedicated_thread: true,
            video: true,
        }
    }
}

/// Behavior flags requested when a bridge is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeFlags {
    /// Let the provider optimize the mixing topology on the fly.
    pub smart_optimize: bool,
    /// Tear the bridge down once the last leg leaves.
    pub dissolve_when_empty: bool,
}

impl BridgeFlags {
    pub fn conference() -> Self {
        Self {
            smart_optimize: true,
            dissolve_when_empty: true,
        }
    }
}

/// Per-leg feature set applied while the leg sits on a bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeFeatures {
    pub mute: bool,
}

/// Interface to the external media-bridge provider.
///
/// Implementations serialize `depart` against concurrent joins with their
/// own advisory locking; callers never hold engine locks across `join`.
#[async_trait]
pub trait MediaBridgePort: Send + Sync {
    async fn create_bridge(
        &self,
        capabilities: BridgeCapabilities,
        flags: BridgeFlags,
    ) -> Result<BridgeHandle>;

    /// Attaches the leg to the bridge and blocks until the leg is removed
    /// or departs.
    async fn join(
        &self,
        bridge: &BridgeHandle,
        leg: Arc<dyn CallLeg>,
        features: BridgeFeatures,
    ) -> Result<()>;

    /// Removes the leg from the bridge without terminating its call.
    async fn depart(&self, bridge: &BridgeHandle, leg: Arc<dyn CallLeg>) -> Result<()>;

    /// Pushes the effective media mute for a leg on the bridge.
    async fn set_mute(&self, bridge: &BridgeHandle, leg: Arc<dyn CallLeg>, muted: bool)
        -> Result<()>;

    async fn destroy_bridge(&self, bridge: &BridgeHandle) -> Result<()>;
}
