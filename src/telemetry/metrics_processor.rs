//! Metrics processor (C8): joins telemetry with the flow engine's admission
//! decisions (C3) and exports histograms/counters through this crate's
//! observability facade.
//!
//! Grounded in `pkg/otelcollector/metricsprocessor/factory.go`'s
//! `NewFactory(promRegistry, engine)` pairing — the upstream factory wires a
//! Prometheus registry and the dataplane `Engine` into one processor; the
//! concrete aggregation body lives only as that factory wiring upstream; the
//! per-request join this type performs is this rewrite's responsibility.

use std::time::Duration;

use crate::engine::{CheckResponse, Decision, RejectReason};
use crate::error::DataPlaneError;
use crate::observability::attributes::KeyValue;
use crate::observability::metrics::{Counter, Histogram, InstrumentDescriptor, MetricsProvider};
use crate::telemetry::{AttributeValue, LogsProcessor, ProcessorCapabilities, TelemetryRecord};

/// Attribute key a record carries when it should be joined with a decision
/// already recorded via [`MetricsProcessor::record_decision`]; this processor
/// itself only forwards such records, the join happens by shared
/// `control_point`/label cardinality in the exported metric, not by mutating
/// the record.
pub const CONTROL_POINT_KEY: &str = "control_point";

fn reject_reason_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::RateLimited => "rate_limited",
        RejectReason::ConcurrencyLimited => "concurrency_limited",
        RejectReason::DeadlineExceeded => "deadline_exceeded",
    }
}

/// Records one [`CheckResponse`] as a histogram observation (request
/// duration) plus a decision counter, both labeled by `control_point` and
/// `decision`. Also implements [`LogsProcessor`] as a transparent pass-through
/// stage so it can sit in the same pipeline as the rollup/enrichment
/// processors without mutating data (`MutatesData: false`).
pub struct MetricsProcessor {
    metrics: std::sync::Arc<dyn MetricsProvider>,
    request_duration: std::sync::Arc<dyn Histogram>,
    decisions: std::sync::Arc<dyn Counter>,
    limiter_decisions: std::sync::Arc<dyn Counter>,
    flux_meter_latency: std::sync::Arc<dyn Histogram>,
}

impl MetricsProcessor {
    pub fn new(metrics: std::sync::Arc<dyn MetricsProvider>) -> Self {
        let request_duration =
            metrics.histogram(&InstrumentDescriptor::new("flow_engine.request_duration_ms"));
        let decisions = metrics.counter(&InstrumentDescriptor::new("flow_engine.decisions"));
        let limiter_decisions =
            metrics.counter(&InstrumentDescriptor::new("flow_engine.limiter_decisions"));
        let flux_meter_latency =
            metrics.histogram(&InstrumentDescriptor::new("flow_engine.flux_meter_duration_ms"));
        Self {
            metrics,
            request_duration,
            decisions,
            limiter_decisions,
            flux_meter_latency,
        }
    }

    pub fn metrics(&self) -> &std::sync::Arc<dyn MetricsProvider> {
        &self.metrics
    }

    /// Records one request's outcome. Call this at the point the flow
    /// engine's `process_request` returns, with the wall-clock duration of
    /// the call.
    ///
    /// Beyond the overall `control_point`/`decision`-tagged histogram and
    /// counter, every rate and concurrency limiter consulted while reaching
    /// the decision gets its own accept/reject count tagged by `limiter_id`,
    /// and — on acceptance only — every credited flux meter gets a latency
    /// sample tagged by `limiter_id`, using this call's duration as the
    /// `workload_duration_ms` value (§4.7).
    pub fn record_decision(&self, control_point: &str, response: &CheckResponse, duration: Duration) {
        let decision_label = match response.decision {
            Decision::Accepted => "accepted",
            Decision::Rejected(reason) => reject_reason_label(reason),
        };
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let attrs = [
            KeyValue::new("control_point", control_point.to_string()),
            KeyValue::new("decision", decision_label),
        ];
        self.request_duration.record(duration_ms, &attrs);
        self.decisions.increment(&attrs);

        for id in response.rate_limiter_ids.iter().chain(&response.concurrency_limiter_ids) {
            let limiter_attrs = [
                KeyValue::new("limiter_id", id.to_string()),
                KeyValue::new("decision", decision_label),
            ];
            self.limiter_decisions.increment(&limiter_attrs);
        }

        if response.is_accepted() {
            for id in &response.flux_meter_ids {
                let flux_attrs = [KeyValue::new("limiter_id", id.to_string())];
                self.flux_meter_latency.record(duration_ms, &flux_attrs);
            }
        }
    }
}

impl LogsProcessor for MetricsProcessor {
    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities { mutates_data: false }
    }

    fn consume_logs(&self, records: Vec<TelemetryRecord>) -> Result<Vec<TelemetryRecord>, DataPlaneError> {
        for record in &records {
            if let Some(AttributeValue::Str(control_point)) = record.attributes.get(CONTROL_POINT_KEY) {
                let attrs = [KeyValue::new("control_point", control_point.clone())];
                self.decisions.increment(&attrs);
            }
        }
        Ok(records)
    }
}
