//! Storage Backend Adapters
//!
//! Implementations of the backend facade:
//! - Civo: the public cloud block storage API
//! - Memory: in-process control plane for standalone runs and tests

pub mod civo;
pub mod memory;

pub use civo::*;
pub use memory::*;

use crate::domain::ports::StorageBackendRef;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Factory for creating storage backend adapters
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend adapter by name
    pub fn create(name: &str, config: BackendConfig) -> Result<StorageBackendRef> {
        match name.to_lowercase().as_str() {
            "civo" => Ok(Arc::new(CivoBackend::new(config.civo)?)),
            "memory" | "standalone" => Ok(Arc::new(InMemoryBackend::new(config.civo.region))),
            _ => Err(Error::Configuration(format!("Unknown backend: {}", name))),
        }
    }
}

/// Combined backend configuration
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub civo: CivoConfig,
}
