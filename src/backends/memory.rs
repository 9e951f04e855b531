//! In-Memory Backend
//!
//! Keeps volumes and quota in process. Used for standalone mode and as the
//! fake control plane in tests: new volumes settle into "available" after a
//! configurable number of reads, calls are counted per operation, and any
//! operation can be made to fail.

use crate::domain::ports::{
    CreatedVolume, QuotaSnapshot, RemoteVolume, StorageBackend, VolumeConfig, STATUS_AVAILABLE,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Status of a freshly created volume
pub const STATUS_CREATING: &str = "creating";

// =============================================================================
// Operations
// =============================================================================

/// Backend operations, for call counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendOperation {
    ListVolumes,
    GetVolume,
    CreateVolume,
    GetQuota,
}

impl BackendOperation {
    const ALL: [BackendOperation; 4] = [
        BackendOperation::ListVolumes,
        BackendOperation::GetVolume,
        BackendOperation::CreateVolume,
        BackendOperation::GetQuota,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendOperation::ListVolumes => "list_volumes",
            BackendOperation::GetVolume => "get_volume",
            BackendOperation::CreateVolume => "create_volume",
            BackendOperation::GetQuota => "get_quota",
        }
    }
}

// =============================================================================
// Volume State
// =============================================================================

#[derive(Debug, Clone)]
struct VolumeState {
    volume: RemoteVolume,
    /// Reads left before the volume turns available; `None` never settles
    reads_until_available: Option<u32>,
}

impl VolumeState {
    fn observe(&mut self) -> RemoteVolume {
        if !self.volume.is_available() {
            if let Some(remaining) = self.reads_until_available {
                if remaining <= 1 {
                    self.volume.status = STATUS_AVAILABLE.to_string();
                    self.reads_until_available = Some(0);
                } else {
                    self.reads_until_available = Some(remaining - 1);
                }
            }
        }
        self.volume.clone()
    }
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Process-local stand-in for the storage control plane
pub struct InMemoryBackend {
    region: String,
    /// Reads a new volume needs before it is available
    settle_reads: Option<u32>,
    volumes: RwLock<BTreeMap<String, VolumeState>>,
    quota: RwLock<QuotaSnapshot>,
    faults: RwLock<BTreeSet<BackendOperation>>,
    calls: [AtomicU64; 4],
    next_id: AtomicU64,
}

impl InMemoryBackend {
    /// Create an empty backend with a roomy quota
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            settle_reads: Some(1),
            volumes: RwLock::new(BTreeMap::new()),
            quota: RwLock::new(QuotaSnapshot {
                disk_gb_limit: 1000,
                disk_gb_usage: 0,
                volume_count_limit: 100,
                volume_count_usage: 0,
            }),
            faults: RwLock::new(BTreeSet::new()),
            calls: Default::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reads before new volumes become available (`None` = never)
    pub fn with_settle_reads(mut self, reads: Option<u32>) -> Self {
        self.settle_reads = reads;
        self
    }

    /// Seed an existing volume; its status never changes on its own
    pub fn with_volume(mut self, volume: RemoteVolume) -> Self {
        self.volumes.get_mut().insert(
            volume.id.clone(),
            VolumeState {
                volume,
                reads_until_available: None,
            },
        );
        self
    }

    /// Replace the tenant quota
    pub fn with_quota(mut self, quota: QuotaSnapshot) -> Self {
        *self.quota.get_mut() = quota;
        self
    }

    /// Make every future call of `operation` fail
    pub async fn inject_fault(&self, operation: BackendOperation) {
        self.faults.write().await.insert(operation);
    }

    /// Stop failing `operation`
    pub async fn clear_fault(&self, operation: BackendOperation) {
        self.faults.write().await.remove(&operation);
    }

    /// Number of times `operation` was called
    pub fn calls(&self, operation: BackendOperation) -> u64 {
        self.calls[operation.index()].load(Ordering::Relaxed)
    }

    /// Total calls across all operations
    pub fn total_calls(&self) -> u64 {
        BackendOperation::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Current quota, without counting a call
    pub async fn quota(&self) -> QuotaSnapshot {
        *self.quota.read().await
    }

    async fn enter(&self, operation: BackendOperation) -> Result<()> {
        self.calls[operation.index()].fetch_add(1, Ordering::Relaxed);
        if self.faults.read().await.contains(&operation) {
            return Err(Error::backend(operation.as_str(), 500, "injected fault"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn list_volumes(&self) -> Result<Vec<RemoteVolume>> {
        self.enter(BackendOperation::ListVolumes).await?;

        let volumes = self.volumes.read().await;
        Ok(volumes
            .values()
            .filter(|s| s.volume.region == self.region)
            .map(|s| s.volume.clone())
            .collect())
    }

    async fn get_volume(&self, volume_id: &str) -> Result<RemoteVolume> {
        self.enter(BackendOperation::GetVolume).await?;

        let mut volumes = self.volumes.write().await;
        match volumes.get_mut(volume_id) {
            Some(state) => Ok(state.observe()),
            None => Err(Error::backend(
                "get_volume",
                404,
                format!("DatabaseVolumeNotFound: {}", volume_id),
            )),
        }
    }

    async fn create_volume(&self, config: VolumeConfig) -> Result<CreatedVolume> {
        self.enter(BackendOperation::CreateVolume).await?;

        {
            let mut quota = self.quota.write().await;
            if config.size_gb as i64 > quota.available_gb()
                || quota.volume_count_usage >= quota.volume_count_limit
            {
                return Err(Error::backend(
                    "create_volume",
                    403,
                    "QuotaLimitReached: volume would exceed quota",
                ));
            }
            quota.disk_gb_usage += config.size_gb as i64;
            quota.volume_count_usage += 1;
        }

        let id = format!("vol-{:08x}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let status = match self.settle_reads {
            Some(0) => STATUS_AVAILABLE,
            _ => STATUS_CREATING,
        };

        info!(volume_id = %id, name = %config.name, size_gb = config.size_gb, "Created in-memory volume");

        let state = VolumeState {
            volume: RemoteVolume {
                id: id.clone(),
                name: config.name.clone(),
                size_gb: config.size_gb,
                status: status.to_string(),
                region: config.region,
            },
            reads_until_available: self.settle_reads,
        };
        self.volumes.write().await.insert(id.clone(), state);

        Ok(CreatedVolume {
            id,
            name: config.name,
        })
    }

    async fn get_quota(&self) -> Result<QuotaSnapshot> {
        self.enter(BackendOperation::GetQuota).await?;
        let quota = *self.quota.read().await;
        debug!(?quota, "Read in-memory quota");
        Ok(quota)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
