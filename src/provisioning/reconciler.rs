//! Provisioning Reconciler
//!
//! Create-or-adopt for a named volume. Nothing is persisted locally: every
//! call re-reads backend state, so repeating a call with the same name and
//! size returns the same volume without creating a second one.
//!
//! ```text
//! Validating -> ResolvingSize -> CheckingExistence --(found)--------+
//!                                      |                             |
//!                                  (missing)                         v
//!                                      +--> Admitting --> AwaitingAvailability -> Succeeded
//! any step --(error)--> Failed
//! ```

use super::poller::{wait_for_status, PollConfig, PollOutcome};
use super::quota;
use super::sizing::{resolve_size, CapacityDecision};
use crate::domain::ports::{
    AccessType, RemoteVolume, StorageBackendRef, VolumeConfig, VolumeRequest, STATUS_AVAILABLE,
};
use crate::error::{Error, Result};
use crate::metrics::{failure_label, ProvisionMetrics};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

// =============================================================================
// States
// =============================================================================

/// Whether the volume was made by this call or already existed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Created,
    Adopted,
}

impl Provenance {
    fn label(self) -> &'static str {
        match self {
            Provenance::Created => "created",
            Provenance::Adopted => "adopted",
        }
    }
}

/// A ready volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedVolume {
    pub volume_id: String,
    pub capacity_bytes: i64,
    pub size_gb: u64,
    pub provenance: Provenance,
}

/// Work left to do; each arm does at most one round of backend I/O
enum Step {
    Validating,
    ResolvingSize,
    CheckingExistence(CapacityDecision),
    Admitting(CapacityDecision),
    AwaitingAvailability {
        decision: CapacityDecision,
        volume_id: String,
        last_seen: Option<String>,
        provenance: Provenance,
    },
    Succeeded(ProvisionedVolume),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Validating => "validating",
            Step::ResolvingSize => "resolving_size",
            Step::CheckingExistence(_) => "checking_existence",
            Step::Admitting(_) => "admitting",
            Step::AwaitingAvailability { .. } => "awaiting_availability",
            Step::Succeeded(_) => "succeeded",
        }
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Reject requests the plugin cannot serve, before any backend call
pub fn validate_request(request: &VolumeRequest) -> Result<()> {
    if request.name.is_empty() {
        return Err(Error::InvalidArgument(
            "CreateVolume Name must be provided".into(),
        ));
    }
    if request.capabilities.is_empty() {
        return Err(Error::InvalidArgument(
            "CreateVolume Volume capabilities must be provided".into(),
        ));
    }

    for capability in &request.capabilities {
        if !capability.access_mode.is_supported() {
            return Err(Error::InvalidArgument(format!(
                "CreateVolume access mode {} isn't supported",
                capability.access_mode
            )));
        }
        if matches!(capability.access_type, Some(AccessType::Block)) {
            return Err(Error::InvalidArgument(
                "CreateVolume block types aren't supported, only mount types".into(),
            ));
        }
    }

    Ok(())
}

/// Find the volume already holding `name`.
///
/// A same-named volume of another size is a conflict, never resized.
pub fn match_existing<'a>(
    volumes: &'a [RemoteVolume],
    name: &str,
    decision: &CapacityDecision,
) -> Result<Option<&'a RemoteVolume>> {
    match volumes.iter().find(|v| v.name == name) {
        Some(v) if v.size_gb != decision.size_gb => Err(Error::VolumeExists {
            name: name.to_string(),
            existing_gb: v.size_gb,
            requested_gb: decision.size_gb,
        }),
        found => Ok(found),
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Settings for the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Region new volumes are created in
    pub region: String,
    /// Availability polling budget
    pub poll: PollConfig,
}

/// Turns a creation intent into a ready backend volume
pub struct Reconciler {
    backend: StorageBackendRef,
    config: ReconcilerConfig,
    metrics: Option<Arc<ProvisionMetrics>>,
}

impl Reconciler {
    pub fn new(backend: StorageBackendRef, config: ReconcilerConfig) -> Self {
        Self {
            backend,
            config,
            metrics: None,
        }
    }

    /// Record outcomes and backend calls into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ProvisionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn backend(&self) -> &StorageBackendRef {
        &self.backend
    }

    /// Reconcile `request` into a ready volume.
    ///
    /// Blocks for up to the poll budget while the backend finishes creating
    /// the volume, unless `cancel` fires first.
    pub async fn reconcile(
        &self,
        request: &VolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedVolume> {
        let started = Instant::now();
        let span = info_span!("create_volume", name = %request.name);
        let result = self.run(request, cancel).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(volume) => volume.provenance.label(),
                Err(e) => failure_label(e),
            };
            metrics.record_outcome(outcome, started.elapsed());
        }
        result
    }

    async fn run(
        &self,
        request: &VolumeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedVolume> {
        let mut step = Step::Validating;

        loop {
            let phase = step.name();
            let result = match step {
                Step::Validating => validate_request(request).map(|_| Step::ResolvingSize),
                Step::ResolvingSize => resolve_size(request.capacity_range.as_ref()).map(|decision| {
                    debug!(size_gb = decision.size_gb, "Volume size determined");
                    Step::CheckingExistence(decision)
                }),
                Step::CheckingExistence(decision) => self.check_existence(request, decision).await,
                Step::Admitting(decision) => self.admit_and_create(request, decision).await,
                Step::AwaitingAvailability {
                    decision,
                    volume_id,
                    last_seen,
                    provenance,
                } => {
                    self.await_availability(decision, volume_id, last_seen, provenance, cancel)
                        .await
                }
                Step::Succeeded(volume) => {
                    info!(
                        volume_id = %volume.volume_id,
                        capacity_bytes = volume.capacity_bytes,
                        provenance = volume.provenance.label(),
                        "Volume is ready"
                    );
                    return Ok(volume);
                }
            };

            match result {
                Ok(next) => {
                    debug!(from = phase, to = next.name(), "Provisioning phase transition");
                    step = next;
                }
                Err(e) => {
                    debug!(from = phase, to = "failed", error = %e, "Provisioning phase transition");
                    return Err(e);
                }
            }
        }
    }

    async fn check_existence(
        &self,
        request: &VolumeRequest,
        decision: CapacityDecision,
    ) -> Result<Step> {
        self.record_call("list_volumes");
        let volumes = self
            .backend
            .list_volumes()
            .await
            .inspect_err(|e| error!(error = %e, "Unable to list volumes"))?;

        match match_existing(&volumes, &request.name, &decision)? {
            Some(existing) => {
                debug!(volume_id = %existing.id, "Volume already exists");
                Ok(Step::AwaitingAvailability {
                    decision,
                    volume_id: existing.id.clone(),
                    last_seen: Some(existing.status.clone()),
                    provenance: Provenance::Adopted,
                })
            }
            None => {
                debug!("Volume doesn't currently exist, will need creating");
                Ok(Step::Admitting(decision))
            }
        }
    }

    async fn admit_and_create(
        &self,
        request: &VolumeRequest,
        decision: CapacityDecision,
    ) -> Result<Step> {
        // Fetched after the existence check, never reused across calls
        self.record_call("get_quota");
        let snapshot = self
            .backend
            .get_quota()
            .await
            .inspect_err(|e| error!(error = %e, "Unable to get quota"))?;

        if let Some(rejection) = quota::admit(decision.size_gb, &snapshot).into_error() {
            error!(
                size_gb = decision.size_gb,
                disk_gb_limit = snapshot.disk_gb_limit,
                disk_gb_usage = snapshot.disk_gb_usage,
                volume_count_limit = snapshot.volume_count_limit,
                volume_count_usage = snapshot.volume_count_usage,
                "Requested volume would exceed quota"
            );
            return Err(rejection);
        }
        debug!(
            disk_gb_limit = snapshot.disk_gb_limit,
            disk_gb_usage = snapshot.disk_gb_usage,
            "Quota has sufficient capacity remaining"
        );

        // Concurrent calls for the same new name can both reach this point;
        // whether that yields one volume or two is up to the backend.
        self.record_call("create_volume");
        let created = self
            .backend
            .create_volume(VolumeConfig {
                name: request.name.clone(),
                region: self.config.region.clone(),
                size_gb: decision.size_gb,
            })
            .await
            .inspect_err(|e| error!(error = %e, "Unable to create volume"))?;
        info!(volume_id = %created.id, "Volume created");

        Ok(Step::AwaitingAvailability {
            decision,
            volume_id: created.id,
            last_seen: None,
            provenance: Provenance::Created,
        })
    }

    async fn await_availability(
        &self,
        decision: CapacityDecision,
        volume_id: String,
        last_seen: Option<String>,
        provenance: Provenance,
        cancel: &CancellationToken,
    ) -> Result<Step> {
        let outcome = wait_for_status(
            self.backend.as_ref(),
            &volume_id,
            STATUS_AVAILABLE,
            last_seen,
            &self.config.poll,
            cancel,
            self.metrics.as_deref(),
        )
        .await
        .inspect_err(|e| error!(volume_id = %volume_id, error = %e, "Unable to get volume updates"))?;

        match outcome {
            PollOutcome::Reached { .. } => Ok(Step::Succeeded(ProvisionedVolume {
                volume_id,
                capacity_bytes: decision.capacity_bytes(),
                size_gb: decision.size_gb,
                provenance,
            })),
            PollOutcome::Exhausted {
                last_status,
                attempts,
            } => {
                error!(volume_id = %volume_id, status = %last_status, "Volume is not 'available'");
                Err(Error::VolumeUnavailable {
                    volume_id,
                    status: last_status,
                    attempts,
                })
            }
            PollOutcome::Cancelled { .. } => Err(Error::Cancelled { volume_id }),
        }
    }

    fn record_call(&self, operation: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_backend_call(operation);
        }
    }
}
