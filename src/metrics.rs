//! Provisioning Metrics
//!
//! Prometheus counters for the reconciler, kept on a private registry so the
//! metrics endpoint only exposes what this plugin records.

use crate::error::{Error, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tonic::Code;

/// Metrics recorded by the provisioning reconciler
pub struct ProvisionMetrics {
    registry: Registry,
    provisions: IntCounterVec,
    backend_calls: IntCounterVec,
    poll_attempts: IntCounter,
    duration: Histogram,
}

impl ProvisionMetrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let provisions = IntCounterVec::new(
            Opts::new(
                "csi_provisions_total",
                "CreateVolume reconciliations by outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let backend_calls = IntCounterVec::new(
            Opts::new("csi_backend_calls_total", "Backend API calls by operation"),
            &["operation"],
        )
        .map_err(metrics_error)?;
        let poll_attempts = IntCounter::new(
            "csi_poll_attempts_total",
            "Volume status reads made while waiting for availability",
        )
        .map_err(metrics_error)?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "csi_provision_duration_seconds",
                "Duration of CreateVolume reconciliations",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(provisions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(backend_calls.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(poll_attempts.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            provisions,
            backend_calls,
            poll_attempts,
            duration,
        })
    }

    /// Record the end of one reconciliation
    pub fn record_outcome(&self, outcome: &str, elapsed: Duration) {
        self.provisions.with_label_values(&[outcome]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// Record a call to the backend
    pub fn record_backend_call(&self, operation: &str) {
        self.backend_calls.with_label_values(&[operation]).inc();
    }

    /// Record status reads made by the poller
    pub fn record_poll_attempts(&self, attempts: u32) {
        self.poll_attempts.inc_by(attempts as u64);
    }

    /// Reconciliations recorded with `outcome`
    pub fn provisions(&self, outcome: &str) -> u64 {
        self.provisions.with_label_values(&[outcome]).get()
    }

    /// Backend calls recorded for `operation`
    pub fn backend_calls(&self, operation: &str) -> u64 {
        self.backend_calls.with_label_values(&[operation]).get()
    }

    /// Render in the Prometheus text format, with its content type
    pub fn encode(&self) -> Result<(Vec<u8>, String)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}

/// Outcome label for a failed reconciliation
pub fn failure_label(err: &Error) -> &'static str {
    match err.code() {
        Code::InvalidArgument => "invalid_argument",
        Code::AlreadyExists => "already_exists",
        Code::OutOfRange => "out_of_range",
        Code::Unavailable => "unavailable",
        Code::Cancelled => "cancelled",
        Code::Unimplemented => "unimplemented",
        _ => "internal",
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics error: {}", e))
}
