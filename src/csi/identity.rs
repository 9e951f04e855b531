//! Identity service.

use super::types::{PluginCapability, PluginInfo, ProbeResponse};
use super::Driver;
use async_trait::async_trait;
use tonic::Status;

/// Identity service of the provisioning protocol
#[async_trait]
pub trait Identity: Send + Sync {
    async fn get_plugin_info(&self) -> Result<PluginInfo, Status>;

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, Status>;

    async fn probe(&self) -> Result<ProbeResponse, Status>;
}

#[async_trait]
impl Identity for Driver {
    async fn get_plugin_info(&self) -> Result<PluginInfo, Status> {
        Ok(self.info.clone())
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, Status> {
        Ok(vec![PluginCapability::ControllerService])
    }

    async fn probe(&self) -> Result<ProbeResponse, Status> {
        Ok(ProbeResponse {
            ready: self.is_ready(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemoryBackend;
    use crate::provisioning::{PollConfig, Reconciler, ReconcilerConfig};
    use std::sync::Arc;

    fn driver() -> Arc<Driver> {
        let reconciler = Reconciler::new(
            Arc::new(InMemoryBackend::new("LON1")),
            ReconcilerConfig {
                region: "LON1".into(),
                poll: PollConfig::default(),
            },
        );
        Driver::new("csi.civo.com", reconciler)
    }

    #[tokio::test]
    async fn test_plugin_info() {
        let info = driver().get_plugin_info().await.unwrap();
        assert_eq!(info.name, "csi.civo.com");
        assert_eq!(info.vendor_version, crate::VERSION);
    }

    #[tokio::test]
    async fn test_single_plugin_capability() {
        let caps = driver().get_plugin_capabilities().await.unwrap();
        assert_eq!(caps, vec![PluginCapability::ControllerService]);
    }

    #[tokio::test]
    async fn test_probe_follows_readiness() {
        let driver = driver();
        assert!(!driver.probe().await.unwrap().ready);

        driver.set_ready(true);
        assert!(driver.probe().await.unwrap().ready);

        driver.shutdown();
        assert!(!driver.probe().await.unwrap().ready);
    }
}
