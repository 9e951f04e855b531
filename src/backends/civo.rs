//! Civo Block Storage Adapter
//!
//! Talks to the Civo v2 REST API. All calls are region scoped and
//! authenticated with the account API key.

use crate::domain::ports::{CreatedVolume, QuotaSnapshot, RemoteVolume, StorageBackend, VolumeConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Civo adapter
#[derive(Debug, Clone)]
pub struct CivoConfig {
    /// API base URL
    pub api_url: String,
    /// Account API key
    pub api_key: String,
    /// Region all volumes are created in
    pub region: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for CivoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.civo.com".to_string(),
            api_key: String::new(),
            region: "LON1".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CivoVolume {
    id: String,
    name: String,
    #[serde(default)]
    size_gigabytes: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateVolumeBody<'a> {
    name: &'a str,
    size_gigabytes: u64,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateVolumeResult {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CivoQuota {
    disk_gigabytes_limit: i64,
    disk_gigabytes_usage: i64,
    disk_volume_count_limit: i64,
    disk_volume_count_usage: i64,
}

/// Error body returned by the API
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    reason: String,
}

impl CivoVolume {
    fn into_remote(self, default_region: &str) -> RemoteVolume {
        RemoteVolume {
            id: self.id,
            name: self.name,
            size_gb: self.size_gigabytes,
            status: self.status,
            region: self.region.unwrap_or_else(|| default_region.to_string()),
        }
    }
}

impl From<CivoQuota> for QuotaSnapshot {
    fn from(q: CivoQuota) -> Self {
        Self {
            disk_gb_limit: q.disk_gigabytes_limit,
            disk_gb_usage: q.disk_gigabytes_usage,
            volume_count_limit: q.disk_volume_count_limit,
            volume_count_usage: q.disk_volume_count_usage,
        }
    }
}

// =============================================================================
// Civo Backend
// =============================================================================

/// Backend adapter for Civo volumes
pub struct CivoBackend {
    config: CivoConfig,
    client: Client,
}

impl CivoBackend {
    /// Build the adapter and its HTTP client
    pub fn new(config: CivoConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Configuration("Civo API key must be provided".into()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("bearer {}", config.api_key))
            .map_err(|e| Error::Configuration(format!("Invalid API key: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!("civo-csi/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn region_query(&self) -> [(&str, &str); 1] {
        [("region", self.config.region.as_str())]
    }

    /// Decode a successful body or turn the API's error into `Error::BackendApi`
    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        let api_error: ApiError = serde_json::from_slice(&body).unwrap_or_default();
        let reason = match (api_error.code.is_empty(), api_error.reason.is_empty()) {
            (false, false) => format!("{}: {}", api_error.code, api_error.reason),
            (false, true) => api_error.code,
            (true, false) => api_error.reason,
            (true, true) => String::from_utf8_lossy(&body).into_owned(),
        };

        let err = Error::backend(operation, status.as_u16(), reason);
        if err.is_transient() {
            warn!(operation, status = status.as_u16(), "Transient Civo API failure");
        }
        Err(err)
    }
}

#[async_trait]
impl StorageBackend for CivoBackend {
    async fn list_volumes(&self) -> Result<Vec<RemoteVolume>> {
        debug!("Listing current volumes in Civo API");
        let response = self
            .client
            .get(self.url("volumes"))
            .query(&self.region_query())
            .send()
            .await?;

        let volumes: Vec<CivoVolume> = Self::decode("list_volumes", response).await?;
        Ok(volumes
            .into_iter()
            .map(|v| v.into_remote(&self.config.region))
            .collect())
    }

    async fn get_volume(&self, volume_id: &str) -> Result<RemoteVolume> {
        let path = format!("volumes/{}", urlencoding::encode(volume_id));
        let response = self
            .client
            .get(self.url(&path))
            .query(&self.region_query())
            .send()
            .await?;

        let volume: CivoVolume = Self::decode("get_volume", response).await?;
        Ok(volume.into_remote(&self.config.region))
    }

    async fn create_volume(&self, config: VolumeConfig) -> Result<CreatedVolume> {
        debug!(name = %config.name, size_gb = config.size_gb, "Creating volume in Civo API");
        let body = CreateVolumeBody {
            name: &config.name,
            size_gigabytes: config.size_gb,
            region: &config.region,
        };
        let response = self
            .client
            .post(self.url("volumes"))
            .json(&body)
            .send()
            .await?;

        let result: CreateVolumeResult = Self::decode("create_volume", response).await?;
        Ok(CreatedVolume {
            id: result.id,
            name: if result.name.is_empty() {
                config.name
            } else {
                result.name
            },
        })
    }

    async fn get_quota(&self) -> Result<QuotaSnapshot> {
        debug!("Requesting available capacity in client's quota from the Civo API");
        let response = self
            .client
            .get(self.url("quota"))
            .query(&self.region_query())
            .send()
            .await?;

        let quota: CivoQuota = Self::decode("get_quota", response).await?;
        Ok(quota.into())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.get_quota().await.is_ok())
    }

    fn backend_name(&self) -> &str {
        "civo"
    }
}
