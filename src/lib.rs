//! Civo CSI - Block Volume Provisioning Plugin
//!
//! A controller plugin that turns CreateVolume requests from a container
//! orchestrator into Civo block storage volumes. Provisioning is idempotent:
//! a retried request adopts the volume created by an earlier attempt instead
//! of creating a duplicate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Protocol Adapter (csi)                          │
//! │  ┌──────────────┐   ┌──────────────────────┐   ┌──────────────────────┐  │
//! │  │   Identity   │   │      Controller      │   │   Node (all Unimpl)  │  │
//! │  └──────────────┘   └──────────┬───────────┘   └──────────────────────┘  │
//! ├────────────────────────────────┼────────────────────────────────────────┤
//! │                    Provisioning Reconciler                               │
//! │  ┌──────────────┐  ┌───────────┴──┐  ┌──────────────┐  ┌──────────────┐  │
//! │  │    Size      │  │  Existence   │  │    Quota     │  │ Availability │  │
//! │  │  Negotiator  │  │    Match     │  │    Guard     │  │    Poller    │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └──────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                     Storage Backends (StorageBackend)                    │
//! │  ┌───────────────────────────────┐  ┌─────────────────────────────────┐  │
//! │  │     Civo (REST over reqwest)  │  │   In-memory (standalone/tests)  │  │
//! │  └───────────────────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`csi`]: Identity, Controller and Node services
//! - [`provisioning`]: Size negotiation, quota admission, polling, reconciler
//! - [`backends`]: Civo and in-memory backend adapters
//! - [`domain`]: Core domain types and the backend port
//! - [`config`]: Endpoint parsing and driver assembly
//! - [`metrics`]: Prometheus provisioning metrics
//! - [`error`]: Error types and status mapping

pub mod backends;
pub mod config;
pub mod csi;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod provisioning;

// Re-export commonly used types
pub use backends::{BackendConfig, BackendFactory, CivoBackend, CivoConfig, InMemoryBackend};

pub use config::{DriverConfig, Endpoint};

pub use csi::{
    Controller, ControllerCapability, CreateVolumeRequest, CreateVolumeResponse, Driver,
    Identity, Node, PluginCapability, PluginInfo, ProbeResponse, Volume, DEFAULT_DRIVER_NAME,
};

pub use domain::ports::{
    AccessMode, AccessType, CapacityRange, QuotaSnapshot, RemoteVolume, StorageBackend,
    StorageBackendRef, VolumeCapability, VolumeRequest,
};

pub use error::{Error, Result};

pub use metrics::ProvisionMetrics;

pub use provisioning::{
    PollConfig, ProvisionedVolume, Provenance, Reconciler, ReconcilerConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
