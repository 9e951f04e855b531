//! Protocol Adapter
//!
//! Identity, Controller and Node services of the provisioning protocol. Only
//! CreateVolume and the identity calls do real work; every other operation
//! answers `Unimplemented` rather than pretending to succeed.

macro_rules! unsupported {
    ($name:expr) => {{
        ::tracing::warn!(operation = $name, "Unsupported method called");
        return Err($crate::error::Error::Unimplemented {
            operation: $name.to_string(),
        }
        .into());
    }};
}

pub mod controller;
pub mod identity;
pub mod node;
pub mod types;

pub use controller::Controller;
pub use identity::Identity;
pub use node::Node;
pub use types::*;

use crate::provisioning::Reconciler;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default plugin name
pub const DEFAULT_DRIVER_NAME: &str = "csi.civo.com";

/// The plugin: one value serving all three protocol services
pub struct Driver {
    info: PluginInfo,
    reconciler: Reconciler,
    ready: AtomicBool,
    shutdown: CancellationToken,
}

impl Driver {
    /// Create a driver that provisions through `reconciler`
    pub fn new(name: impl Into<String>, reconciler: Reconciler) -> Arc<Self> {
        Arc::new(Self {
            info: PluginInfo {
                name: name.into(),
                vendor_version: crate::VERSION.to_string(),
                manifest: BTreeMap::new(),
            },
            reconciler,
            ready: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Flip the readiness reported by Probe
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Stop serving; in-flight availability waits end as cancelled
    pub fn shutdown(&self) {
        self.set_ready(false);
        self.shutdown.cancel();
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}
