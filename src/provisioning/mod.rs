//! Volume Provisioning Core
//!
//! Size negotiation, quota admission, availability polling and the
//! reconciler that ties them into idempotent create-or-adopt.

pub mod poller;
pub mod quota;
pub mod reconciler;
pub mod sizing;

pub use poller::{wait_for_status, PollConfig, PollOutcome};
pub use quota::{admit, QuotaDecision};
pub use reconciler::*;
pub use sizing::{resolve_size, CapacityDecision};
