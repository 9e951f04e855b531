//! Plugin configuration
//!
//! Endpoint parsing and assembly of a [`Driver`] from its settings.

use crate::backends::{BackendConfig, BackendFactory};
use crate::csi::{Driver, DEFAULT_DRIVER_NAME};
use crate::domain::ports::StorageBackend;
use crate::error::{Error, Result};
use crate::metrics::ProvisionMetrics;
use crate::provisioning::{PollConfig, Reconciler, ReconcilerConfig};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing::{debug, info};

// =============================================================================
// Endpoint
// =============================================================================

/// Local socket the protocol is served on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    /// Parse a `unix://` endpoint URI.
    ///
    /// `unix:///run/csi.sock` and `unix:/run/csi.sock` give `/run/csi.sock`;
    /// `unix://csi/csi.sock` gives the relative path `csi/csi.sock`.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| Error::Configuration(format!("parsing the endpoint {}: {}", uri, e)))?;

        if url.scheme() != "unix" {
            return Err(Error::Configuration(format!(
                "only supported scheme is unix, but provided {}",
                url.scheme()
            )));
        }

        let path = match url.host_str() {
            Some(host) if !host.is_empty() => {
                Path::new(host).join(url.path().trim_start_matches('/'))
            }
            _ => PathBuf::from(url.path()),
        };

        if path.as_os_str().is_empty() || path == Path::new("/") {
            return Err(Error::Configuration(format!(
                "endpoint {} has no socket path",
                uri
            )));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a socket left behind by a previous run
    pub fn prepare(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed stale endpoint socket");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Configuration(format!(
                "removing listen address {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Replace any stale socket and listen on the endpoint path
    pub fn bind(&self) -> Result<UnixListener> {
        self.prepare()?;
        let listener = UnixListener::bind(&self.path).map_err(|e| {
            Error::Configuration(format!("listening on {}: {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), "Listening for connections");
        Ok(listener)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unix://{}", self.path.display())
    }
}

// =============================================================================
// Driver Configuration
// =============================================================================

/// Everything needed to assemble a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Plugin name reported by GetPluginInfo
    pub driver_name: String,
    /// Backend adapter name (`civo` or `memory`)
    pub backend_kind: String,
    /// Backend settings, including region and API key
    pub backend: BackendConfig,
    /// Availability polling budget
    pub poll: PollConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
            backend_kind: "civo".to_string(),
            backend: BackendConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Build the backend, reconciler and driver
    pub fn build(&self, metrics: Option<Arc<ProvisionMetrics>>) -> Result<Arc<Driver>> {
        if self.backend.civo.region.is_empty() {
            return Err(Error::Configuration("region must be provided".into()));
        }

        let backend = BackendFactory::create(&self.backend_kind, self.backend.clone())?;
        info!(
            backend = backend.backend_name(),
            region = %self.backend.civo.region,
            "Storage backend ready"
        );

        let mut reconciler = Reconciler::new(
            backend,
            ReconcilerConfig {
                region: self.backend.civo.region.clone(),
                poll: self.poll,
            },
        );
        if let Some(metrics) = metrics {
            reconciler = reconciler.with_metrics(metrics);
        }

        Ok(Driver::new(self.driver_name.clone(), reconciler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_absolute_endpoint() {
        let endpoint = Endpoint::parse("unix:///var/lib/kubelet/plugins/csi.sock").unwrap();
        assert_eq!(endpoint.path(), Path::new("/var/lib/kubelet/plugins/csi.sock"));

        let endpoint = Endpoint::parse("unix:/csi/csi.sock").unwrap();
        assert_eq!(endpoint.path(), Path::new("/csi/csi.sock"));
    }

    #[test]
    fn test_parse_host_endpoint() {
        let endpoint = Endpoint::parse("unix://csi/csi.sock").unwrap();
        assert_eq!(endpoint.path(), Path::new("csi/csi.sock"));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_matches!(
            Endpoint::parse("tcp://127.0.0.1:10000"),
            Err(Error::Configuration(m)) if m.contains("tcp")
        );
        assert_matches!(Endpoint::parse("not a uri"), Err(Error::Configuration(_)));
        assert_matches!(Endpoint::parse("unix://"), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_prepare_removes_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csi.sock");
        std::fs::write(&path, b"").unwrap();

        let endpoint = Endpoint::parse(&format!("unix://{}", path.display())).unwrap();
        endpoint.prepare().unwrap();
        assert!(!path.exists());

        // Nothing to remove is fine too
        endpoint.prepare().unwrap();
    }

    #[tokio::test]
    async fn test_bind_listens_on_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csi.sock");
        std::fs::write(&path, b"stale").unwrap();

        let endpoint = Endpoint::parse(&format!("unix://{}", path.display())).unwrap();
        let _listener = endpoint.bind().unwrap();

        tokio::net::UnixStream::connect(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_fails_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("csi.sock");

        let endpoint = Endpoint::parse(&format!("unix://{}", path.display())).unwrap();
        assert_matches!(endpoint.bind().err(), Some(Error::Configuration(_)));
    }

    #[test]
    fn test_build_standalone_driver() {
        let config = DriverConfig {
            backend_kind: "memory".into(),
            ..Default::default()
        };
        let driver = config.build(None).unwrap();
        assert!(!driver.is_ready());
        assert_eq!(driver.reconciler().backend().backend_name(), "memory");
    }

    #[test]
    fn test_build_requires_region() {
        let mut config = DriverConfig {
            backend_kind: "memory".into(),
            ..Default::default()
        };
        config.backend.civo.region.clear();
        assert_matches!(config.build(None).err(), Some(Error::Configuration(_)));
    }
}
