//! Node service. Staging and mounting happen outside this plugin, so every
//! RPC answers `Unimplemented`.

use super::Driver;
use async_trait::async_trait;
use tonic::Status;

/// Node service of the provisioning protocol
#[async_trait]
pub trait Node: Send + Sync {
    async fn node_stage_volume(&self, _volume_id: &str, _staging_target_path: &str) -> Result<(), Status> {
        unsupported!("NodeStageVolume")
    }

    async fn node_unstage_volume(&self, _volume_id: &str, _staging_target_path: &str) -> Result<(), Status> {
        unsupported!("NodeUnstageVolume")
    }

    async fn node_publish_volume(&self, _volume_id: &str, _target_path: &str) -> Result<(), Status> {
        unsupported!("NodePublishVolume")
    }

    async fn node_unpublish_volume(&self, _volume_id: &str, _target_path: &str) -> Result<(), Status> {
        unsupported!("NodeUnpublishVolume")
    }

    async fn node_get_volume_stats(&self, _volume_id: &str, _volume_path: &str) -> Result<(), Status> {
        unsupported!("NodeGetVolumeStats")
    }

    async fn node_expand_volume(&self, _volume_id: &str, _volume_path: &str) -> Result<i64, Status> {
        unsupported!("NodeExpandVolume")
    }

    async fn node_get_capabilities(&self) -> Result<(), Status> {
        unsupported!("NodeGetCapabilities")
    }

    async fn node_get_info(&self) -> Result<(), Status> {
        unsupported!("NodeGetInfo")
    }
}

impl Node for Driver {}
