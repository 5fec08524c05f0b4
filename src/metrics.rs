//! Prometheus metrics for the travel request workflow.
//!
//! The engine always emits counters through the `metrics` facade. This module adds
//! an optional Prometheus registry (feature `prometheus`) for embedders that scrape
//! directly instead of installing a `metrics` recorder.
//!
//! All counters carry `from`/`to` status labels so approvals and cancellations can
//! be told apart.

#[cfg(feature = "prometheus")]
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};

#[cfg(feature = "prometheus")]
use crate::error::{Result, TransitionError};
#[cfg(feature = "prometheus")]
use crate::request::Status;

/// Prometheus metrics registry for the workflow engine.
#[cfg(feature = "prometheus")]
#[derive(Clone)]
pub struct TravelflowMetrics {
    registry: Registry,
    transitions_total: CounterVec,
    transition_rejections_total: CounterVec,
    notification_failures_total: CounterVec,
}

#[cfg(feature = "prometheus")]
impl TravelflowMetrics {
    /// Create the counters and register them with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics fail to register (e.g., duplicate registration).
    pub fn new(registry: Registry) -> Result<Self> {
        let transitions_total = CounterVec::new(
            Opts::new(
                "travelflow_transitions_total",
                "Total number of committed travel request status transitions",
            ),
            &["from", "to"],
        )
        .map_err(|e| anyhow::anyhow!("Failed to create transitions_total counter: {}", e))?;

        let transition_rejections_total = CounterVec::new(
            Opts::new(
                "travelflow_transition_rejections_total",
                "Total number of rejected travel request status transitions by reason",
            ),
            &["from", "to", "reason"],
        )
        .map_err(|e| {
            anyhow::anyhow!("Failed to create transition_rejections_total counter: {}", e)
        })?;

        let notification_failures_total = CounterVec::new(
            Opts::new(
                "travelflow_notification_failures_total",
                "Total number of status change notifications that failed after commit",
            ),
            &["from", "to"],
        )
        .map_err(|e| {
            anyhow::anyhow!("Failed to create notification_failures_total counter: {}", e)
        })?;

        registry
            .register(Box::new(transitions_total.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to register transitions_total: {}", e))?;
        registry
            .register(Box::new(transition_rejections_total.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to register transition_rejections_total: {}", e))?;
        registry
            .register(Box::new(notification_failures_total.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to register notification_failures_total: {}", e))?;

        Ok(Self {
            registry,
            transitions_total,
            transition_rejections_total,
            notification_failures_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: Status, to: Status) {
        self.transitions_total
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_rejection(&self, error: &TransitionError) {
        self.transition_rejections_total
            .with_label_values(&[
                error.from_status().as_str(),
                error.to_status().as_str(),
                error.kind().as_str(),
            ])
            .inc();
    }

    pub fn record_notification_failure(&self, from: Status, to: Status) {
        self.notification_failures_total
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer)
            .map_err(|e| anyhow::anyhow!("Metrics output is not UTF-8: {}", e).into())
    }
}
