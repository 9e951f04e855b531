//! Availability Poller
//!
//! The backend creates volumes asynchronously, so readiness is observed by
//! re-reading the volume until it reports the target status.

use crate::domain::ports::{
    RemoteVolume, StorageBackend, DEFAULT_AVAILABILITY_RETRIES, DEFAULT_POLL_INTERVAL,
};
use crate::error::Result;
use crate::metrics::ProvisionMetrics;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status read
    pub interval: Duration,
    /// Number of status reads before giving up
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_AVAILABILITY_RETRIES,
        }
    }
}

impl PollConfig {
    /// Worst-case time spent waiting
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Target status observed
    Reached { volume: RemoteVolume, attempts: u32 },
    /// Budget spent without seeing the target status
    Exhausted { last_status: String, attempts: u32 },
    /// Caller gave up while waiting
    Cancelled { last_status: String, attempts: u32 },
}

/// Wait for `volume_id` to reach `target`.
///
/// `last_seen` is the status known before polling starts, reported if no read
/// completes. Each read is counted in `metrics`. A failed read ends the poll
/// with that error; only status convergence is retried here.
pub async fn wait_for_status(
    backend: &dyn StorageBackend,
    volume_id: &str,
    target: &str,
    last_seen: Option<String>,
    config: &PollConfig,
    cancel: &CancellationToken,
    metrics: Option<&ProvisionMetrics>,
) -> Result<PollOutcome> {
    info!(
        volume_id,
        desired_state = target,
        max_attempts = config.max_attempts,
        max_wait_secs = config.max_wait().as_secs(),
        "Waiting for volume to enter desired state"
    );

    let mut last_status = last_seen.unwrap_or_else(|| "unknown".to_string());

    for attempt in 1..=config.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(volume_id, attempt, "Stopped waiting for volume, request cancelled");
                return Ok(PollOutcome::Cancelled {
                    last_status,
                    attempts: attempt - 1,
                });
            }
            _ = tokio::time::sleep(config.interval) => {}
        }

        if let Some(metrics) = metrics {
            metrics.record_backend_call("get_volume");
            metrics.record_poll_attempts(1);
        }
        let volume = backend.get_volume(volume_id).await?;
        debug!(volume_id, attempt, status = %volume.status, "Polled volume status");

        if volume.status == target {
            return Ok(PollOutcome::Reached {
                volume,
                attempts: attempt,
            });
        }
        last_status = volume.status;
    }

    Ok(PollOutcome::Exhausted {
        last_status,
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{BackendOperation, InMemoryBackend};
    use crate::domain::ports::STATUS_AVAILABLE;
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::ZERO,
            max_attempts,
        }
    }

    fn stuck_volume() -> RemoteVolume {
        RemoteVolume {
            id: "vol-1".into(),
            name: "data".into(),
            size_gb: 10,
            status: "pending".into(),
            region: "LON1".into(),
        }
    }

    #[test]
    fn test_default_budget() {
        let config = PollConfig::default();
        assert_eq!(config.max_attempts, 20);
        assert_eq!(config.max_wait(), Duration::from_secs(100));
    }

    #[tokio::test]
    async fn test_reaches_target() {
        let backend = InMemoryBackend::new("LON1").with_settle_reads(Some(3));
        let created = backend
            .create_volume(crate::domain::ports::VolumeConfig {
                name: "data".into(),
                region: "LON1".into(),
                size_gb: 10,
            })
            .await
            .unwrap();

        let outcome = wait_for_status(
            &backend,
            &created.id,
            STATUS_AVAILABLE,
            None,
            &fast(20),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert_matches!(outcome, PollOutcome::Reached { attempts: 3, .. });
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_status() {
        let backend = InMemoryBackend::new("LON1").with_volume(stuck_volume());

        let outcome = wait_for_status(
            &backend,
            "vol-1",
            STATUS_AVAILABLE,
            None,
            &fast(4),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                last_status: "pending".into(),
                attempts: 4,
            }
        );
        assert_eq!(backend.calls(BackendOperation::GetVolume), 4);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts() {
        let backend = InMemoryBackend::new("LON1").with_volume(stuck_volume());
        backend.inject_fault(BackendOperation::GetVolume).await;

        let result = wait_for_status(
            &backend,
            "vol-1",
            STATUS_AVAILABLE,
            None,
            &fast(20),
            &CancellationToken::new(),
            None,
        )
        .await;

        assert_matches!(result, Err(Error::BackendApi { .. }));
        assert_eq!(backend.calls(BackendOperation::GetVolume), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_read() {
        let backend = InMemoryBackend::new("LON1").with_volume(stuck_volume());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let config = PollConfig {
            interval: Duration::from_secs(60),
            max_attempts: 20,
        };
        let outcome = wait_for_status(
            &backend,
            "vol-1",
            STATUS_AVAILABLE,
            Some("creating".into()),
            &config,
            &cancel,
            None,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Cancelled {
                last_status: "creating".into(),
                attempts: 0,
            }
        );
        assert_eq!(backend.calls(BackendOperation::GetVolume), 0);
    }
}
