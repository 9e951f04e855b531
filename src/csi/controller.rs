//! Controller service.
//!
//! CreateVolume drives the provisioning reconciler. The remaining RPCs have
//! default bodies answering `Unimplemented`.

use super::types::{ControllerCapability, CreateVolumeRequest, CreateVolumeResponse, Volume};
use super::Driver;
use crate::domain::ports::{CapacityRange, VolumeCapability, VolumeRequest};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tonic::Status;
use tracing::info;

/// Controller service of the provisioning protocol
#[async_trait]
pub trait Controller: Send + Sync {
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreateVolumeResponse, Status>;

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, Status>;

    async fn delete_volume(&self, _volume_id: &str) -> Result<(), Status> {
        unsupported!("DeleteVolume")
    }

    async fn controller_publish_volume(&self, _volume_id: &str, _node_id: &str) -> Result<(), Status> {
        unsupported!("ControllerPublishVolume")
    }

    async fn controller_unpublish_volume(&self, _volume_id: &str, _node_id: &str) -> Result<(), Status> {
        unsupported!("ControllerUnpublishVolume")
    }

    async fn validate_volume_capabilities(
        &self,
        _volume_id: &str,
        _capabilities: &[VolumeCapability],
    ) -> Result<(), Status> {
        unsupported!("ValidateVolumeCapabilities")
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, Status> {
        unsupported!("ListVolumes")
    }

    async fn get_capacity(&self) -> Result<i64, Status> {
        unsupported!("GetCapacity")
    }

    async fn controller_expand_volume(
        &self,
        _volume_id: &str,
        _capacity_range: Option<CapacityRange>,
    ) -> Result<i64, Status> {
        unsupported!("ControllerExpandVolume")
    }

    async fn controller_get_volume(&self, _volume_id: &str) -> Result<Volume, Status> {
        unsupported!("ControllerGetVolume")
    }

    async fn controller_modify_volume(
        &self,
        _volume_id: &str,
        _mutable_parameters: BTreeMap<String, String>,
    ) -> Result<(), Status> {
        unsupported!("ControllerModifyVolume")
    }

    async fn create_snapshot(&self, _source_volume_id: &str, _name: &str) -> Result<(), Status> {
        unsupported!("CreateSnapshot")
    }

    async fn delete_snapshot(&self, _snapshot_id: &str) -> Result<(), Status> {
        unsupported!("DeleteSnapshot")
    }

    async fn list_snapshots(&self) -> Result<(), Status> {
        unsupported!("ListSnapshots")
    }
}

#[async_trait]
impl Controller for Driver {
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreateVolumeResponse, Status> {
        info!("Request: CreateVolume");

        let request = VolumeRequest::from(req);
        let volume = self
            .reconciler
            .reconcile(&request, &self.shutdown.child_token())
            .await?;

        Ok(CreateVolumeResponse {
            volume: Volume {
                volume_id: volume.volume_id,
                capacity_bytes: volume.capacity_bytes,
            },
        })
    }

    // Delete and publish are advertised though not served.
    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, Status> {
        Ok(vec![
            ControllerCapability::CreateDeleteVolume,
            ControllerCapability::PublishUnpublishVolume,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{BackendOperation, InMemoryBackend};
    use crate::domain::ports::{AccessMode, BYTES_PER_GB};
    use crate::provisioning::{PollConfig, Reconciler, ReconcilerConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tonic::Code;

    fn driver(backend: Arc<InMemoryBackend>) -> Arc<Driver> {
        let reconciler = Reconciler::new(
            backend,
            ReconcilerConfig {
                region: "LON1".into(),
                poll: PollConfig {
                    interval: Duration::ZERO,
                    max_attempts: 5,
                },
            },
        );
        Driver::new("csi.test", reconciler)
    }

    fn create_request(name: &str, capabilities: Vec<VolumeCapability>) -> CreateVolumeRequest {
        CreateVolumeRequest {
            name: name.into(),
            capacity_range: Some(CapacityRange::required(3 * BYTES_PER_GB)),
            volume_capabilities: capabilities,
            parameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_volume_response() {
        let backend = Arc::new(InMemoryBackend::new("LON1"));
        let driver = driver(backend);

        let response = driver
            .create_volume(create_request(
                "pvc-1",
                vec![VolumeCapability::mount(AccessMode::SingleNodeWriter)],
            ))
            .await
            .unwrap();

        assert!(!response.volume.volume_id.is_empty());
        assert_eq!(response.volume.capacity_bytes, 3 * BYTES_PER_GB);
    }

    #[tokio::test]
    async fn test_create_volume_maps_errors() {
        let backend = Arc::new(InMemoryBackend::new("LON1"));
        let driver = driver(backend.clone());

        let status = driver
            .create_volume(create_request(
                "pvc-1",
                vec![VolumeCapability::block(AccessMode::SingleNodeWriter)],
            ))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(backend.calls(BackendOperation::ListVolumes), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_waits() {
        let backend = Arc::new(InMemoryBackend::new("LON1").with_settle_reads(None));
        let driver = driver(backend);
        driver.shutdown();

        let status = driver
            .create_volume(create_request(
                "pvc-1",
                vec![VolumeCapability::mount(AccessMode::SingleNodeWriter)],
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn test_advertised_capabilities() {
        let driver = driver(Arc::new(InMemoryBackend::new("LON1")));
        let caps = driver.controller_get_capabilities().await.unwrap();
        assert_eq!(
            caps,
            vec![
                ControllerCapability::CreateDeleteVolume,
                ControllerCapability::PublishUnpublishVolume,
            ]
        );
    }

    #[tokio::test]
    async fn test_other_rpcs_unimplemented() {
        let driver = driver(Arc::new(InMemoryBackend::new("LON1")));

        assert_eq!(driver.delete_volume("vol-1").await.unwrap_err().code(), Code::Unimplemented);
        assert_eq!(
            driver
                .controller_publish_volume("vol-1", "node-1")
                .await
                .unwrap_err()
                .code(),
            Code::Unimplemented
        );
        assert_eq!(driver.list_volumes().await.unwrap_err().code(), Code::Unimplemented);
        assert_eq!(driver.get_capacity().await.unwrap_err().code(), Code::Unimplemented);
        assert_eq!(driver.list_snapshots().await.unwrap_err().code(), Code::Unimplemented);
    }
}
