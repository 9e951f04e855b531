//! Domain layer - Core types and port definitions
//!
//! This module defines the backend port that adapters implement and the
//! request/volume types the provisioning core works on.

pub mod ports;

pub use ports::*;
