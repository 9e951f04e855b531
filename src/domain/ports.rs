//! Domain Ports - Core trait definitions for the plugin
//!
//! The provisioning core only talks to the storage control plane through
//! [`StorageBackend`]. Adapters in `crate::backends` implement it.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Bytes in one (binary) gigabyte
pub const BYTES_PER_GB: i64 = 1024 * 1024 * 1024;

/// Size used when a request carries no capacity range
pub const DEFAULT_VOLUME_SIZE_GB: u64 = 10;

/// The only backend status treated as ready
pub const STATUS_AVAILABLE: &str = "available";

/// Number of status checks before giving up on a volume
pub const DEFAULT_AVAILABILITY_RETRIES: u32 = 20;

/// Delay before each status check
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// Backend Types
// =============================================================================

/// A volume as the backend reports it.
///
/// The plugin never mutates one of these; it only observes fresh reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVolume {
    /// Backend-assigned identifier
    pub id: String,
    /// Name, the idempotency key for creation
    pub name: String,
    /// Provisioned size in gigabytes
    pub size_gb: u64,
    /// Backend-defined status string
    pub status: String,
    /// Region the volume lives in
    pub region: String,
}

impl RemoteVolume {
    /// Whether the backend reports this volume as ready
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

/// Parameters for a backend create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    pub region: String,
    pub size_gb: u64,
}

/// What the backend returns from a create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVolume {
    pub id: String,
    pub name: String,
}

/// Tenant quota as read from the backend. Always fetched fresh, never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub disk_gb_limit: i64,
    pub disk_gb_usage: i64,
    pub volume_count_limit: i64,
    pub volume_count_usage: i64,
}

impl QuotaSnapshot {
    /// Gigabytes still free under the disk quota (may be negative)
    pub fn available_gb(&self) -> i64 {
        self.disk_gb_limit - self.disk_gb_usage
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Requested size bounds in bytes. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRange {
    pub required_bytes: i64,
    pub limit_bytes: i64,
}

impl CapacityRange {
    /// Range with only a required size
    pub fn required(bytes: i64) -> Self {
        Self {
            required_bytes: bytes,
            limit_bytes: 0,
        }
    }

    /// Whether neither bound is populated
    pub fn is_unset(&self) -> bool {
        self.required_bytes == 0 && self.limit_bytes == 0
    }
}

/// Access modes of the provisioning protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    Unknown,
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
    SingleNodeSingleWriter,
    SingleNodeMultiWriter,
}

impl AccessMode {
    /// Modes a network block volume attached to one node can honour
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            AccessMode::SingleNodeWriter | AccessMode::SingleNodeReaderOnly
        )
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccessMode::Unknown => "UNKNOWN",
            AccessMode::SingleNodeWriter => "SINGLE_NODE_WRITER",
            AccessMode::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            AccessMode::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            AccessMode::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            AccessMode::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
            AccessMode::SingleNodeSingleWriter => "SINGLE_NODE_SINGLE_WRITER",
            AccessMode::SingleNodeMultiWriter => "SINGLE_NODE_MULTI_WRITER",
        };
        f.write_str(name)
    }
}

/// How the volume is presented to the workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Filesystem mount
    Mount {
        #[serde(default)]
        fs_type: String,
        #[serde(default)]
        mount_flags: Vec<String>,
    },
    /// Raw block device
    Block,
}

/// One requested capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeCapability {
    pub access_mode: AccessMode,
    pub access_type: Option<AccessType>,
}

impl VolumeCapability {
    /// Filesystem capability with the default fs type
    pub fn mount(access_mode: AccessMode) -> Self {
        Self {
            access_mode,
            access_type: Some(AccessType::Mount {
                fs_type: String::new(),
                mount_flags: Vec::new(),
            }),
        }
    }

    /// Raw block capability
    pub fn block(access_mode: AccessMode) -> Self {
        Self {
            access_mode,
            access_type: Some(AccessType::Block),
        }
    }
}

/// Input to one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub name: String,
    pub capacity_range: Option<CapacityRange>,
    pub capabilities: Vec<VolumeCapability>,
}

// =============================================================================
// Storage Backend Port
// =============================================================================

/// Port for the remote storage control plane
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List every volume visible to the tenant in the configured region
    async fn list_volumes(&self) -> Result<Vec<RemoteVolume>>;

    /// Fetch a single volume by id
    async fn get_volume(&self, volume_id: &str) -> Result<RemoteVolume>;

    /// Ask the backend to create a volume. Creation is asynchronous.
    async fn create_volume(&self, config: VolumeConfig) -> Result<CreatedVolume>;

    /// Fetch the tenant's current quota
    async fn get_quota(&self) -> Result<QuotaSnapshot>;

    /// Check if backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get backend name
    fn backend_name(&self) -> &str;
}

pub type StorageBackendRef = Arc<dyn StorageBackend>;
