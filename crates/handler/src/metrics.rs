//! Pipeline counters.
//!
//! Counters are domain-specific rather than generic event counters; use
//! traces for event-level granularity during investigations.

use prometheus::{IntCounter, Registry};
use std::sync::{Arc, OnceLock};

static METRICS: OnceLock<Arc<HandlerMetrics>> = OnceLock::new();

/// Counters exposed by the transaction pipeline.
#[derive(Debug)]
pub struct HandlerMetrics {
    /// Transactions that completed the pipeline (verified and remembered,
    /// or dropped by the pool after verification).
    pub handled: IntCounter,

    /// Inbound messages dropped because the backlog queue was full.
    pub dropped_from_backlog: IntCounter,

    /// Verified items dropped because the post-verification queue was full.
    pub dropped_from_pool: IntCounter,

    /// Verified transactions the pool refused to remember.
    pub remember_failed: IntCounter,
}

impl HandlerMetrics {
    /// Create unregistered counters. Tests use this to get an isolated set
    /// they can assert against.
    pub fn new() -> Self {
        Self {
            handled: IntCounter::new(
                "chainflow_transaction_messages_handled_total",
                "Total transaction messages processed to completion",
            )
            .unwrap(),
            dropped_from_backlog: IntCounter::new(
                "chainflow_transaction_messages_dropped_from_backlog_total",
                "Total transaction messages dropped due to a full backlog queue",
            )
            .unwrap(),
            dropped_from_pool: IntCounter::new(
                "chainflow_transaction_messages_dropped_from_pool_total",
                "Total verified transactions dropped due to a full post-verification queue",
            )
            .unwrap(),
            remember_failed: IntCounter::new(
                "chainflow_transaction_messages_remember_failed_total",
                "Total verified transactions the pool refused to remember",
            )
            .unwrap(),
        }
    }

    /// Create counters registered against `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::new();
        registry.register(Box::new(metrics.handled.clone()))?;
        registry.register(Box::new(metrics.dropped_from_backlog.clone()))?;
        registry.register(Box::new(metrics.dropped_from_pool.clone()))?;
        registry.register(Box::new(metrics.remember_failed.clone()))?;
        Ok(metrics)
    }

    /// The process-wide instance, registered with the default prometheus
    /// registry on first use.
    pub fn shared() -> Arc<HandlerMetrics> {
        METRICS
            .get_or_init(|| {
                Arc::new(Self::register(prometheus::default_registry()).unwrap())
            })
            .clone()
    }
}

impl Default for HandlerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
