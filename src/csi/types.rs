//! Provisioning protocol messages used by the plugin services.

use crate::domain::ports::{CapacityRange, VolumeCapability, VolumeRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Controller Messages
// =============================================================================

/// CreateVolume request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(default)]
    pub capacity_range: Option<CapacityRange>,
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Storage class parameters, accepted and ignored
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl From<CreateVolumeRequest> for VolumeRequest {
    fn from(req: CreateVolumeRequest) -> Self {
        Self {
            name: req.name,
            capacity_range: req.capacity_range,
            capabilities: req.volume_capabilities,
        }
    }
}

/// A provisioned volume as returned to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub volume_id: String,
    pub capacity_bytes: i64,
}

/// CreateVolume response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeResponse {
    pub volume: Volume,
}

/// RPCs the controller service advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerCapability {
    CreateDeleteVolume,
    PublishUnpublishVolume,
}

// =============================================================================
// Identity Messages
// =============================================================================

/// GetPluginInfo response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
}

/// Plugin-level capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginCapability {
    ControllerService,
}

/// Probe response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub ready: bool,
}
