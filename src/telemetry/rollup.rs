//! Rollup processor (C5): groups the records of one batch by their retained
//! (non-source) attributes and emits one synthetic record per group carrying
//! five aggregate moments plus a serialized quantile sketch, per field.
//!
//! Grounded in `pkg/otelcollector/rollupprocessor`'s `processor_test.go`: a
//! group's key is every attribute *except* the configured source fields
//! (`workload_duration_ms` by default); the emitted record carries
//! `rollup_count` plus, per source field, `.sum`/`.min`/`.max`/`.sos`/`.sketch`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DataPlaneError;
use crate::observability::metrics::{Counter, InstrumentDescriptor, MetricsProvider, NoopMetrics};
use crate::telemetry::sketch::DoublesSketch;
use crate::telemetry::{AttributeValue, LogsProcessor, ProcessorCapabilities, TelemetryRecord};

/// Well-known rollup output key suffixes, mirroring `RollupSum`,
/// `RollupMin`, `RollupMax`, `RollupSumOfSquares`, `RollupDatasketch`.
pub const ROLLUP_COUNT_KEY: &str = "rollup_count";
pub const SUM_SUFFIX: &str = "sum";
pub const MIN_SUFFIX: &str = "min";
pub const MAX_SUFFIX: &str = "max";
pub const SOS_SUFFIX: &str = "sos";
pub const SKETCH_SUFFIX: &str = "sketch";

/// Default source attribute the rollup processor aggregates, matching
/// `otelcollector.WorkloadDurationLabel`.
pub const WORKLOAD_DURATION_MS: &str = "workload_duration_ms";

/// Builds the output attribute key for one source field and aggregate kind,
/// e.g. `aggregate_field("workload_duration_ms", SUM_SUFFIX)` ->
/// `"workload_duration_ms.sum"`.
pub fn aggregate_field(source: &str, suffix: &str) -> String {
    format!("{source}.{suffix}")
}

/// Per-group, per-source-field running statistics.
struct FieldStats {
    sum: f64,
    min: f64,
    max: f64,
    sum_of_squares: f64,
    sketch: DoublesSketch,
    parsed_count: u64,
}

impl FieldStats {
    fn new(sketch_k: u16) -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum_of_squares: 0.0,
            sketch: DoublesSketch::new(sketch_k),
            parsed_count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        self.sum += value;
        self.sum_of_squares += value * value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.sketch.update(value);
        self.parsed_count += 1;
    }
}

struct GroupState {
    retained: Vec<(String, AttributeValue)>,
    count: i64,
    fields: HashMap<String, FieldStats>,
}

/// Streams log records through grouping and aggregation, per §4.4.
pub struct RollupProcessor {
    source_fields: Vec<String>,
    sketch_k: u16,
    metrics: Arc<dyn MetricsProvider>,
    parse_errors: Arc<dyn Counter>,
}

impl RollupProcessor {
    /// Creates a processor aggregating `source_fields` with no metrics
    /// backend attached (a [`crate::observability::metrics::NoopMetrics`]).
    pub fn new(source_fields: Vec<String>) -> Self {
        Self::with_metrics(source_fields, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(source_fields: Vec<String>, metrics: Arc<dyn MetricsProvider>) -> Self {
        let parse_errors = metrics.counter(&InstrumentDescriptor::new(
            "rollup.source_field_parse_errors",
        ));
        Self {
            source_fields,
            sketch_k: crate::telemetry::sketch::DEFAULT_K,
            metrics,
            parse_errors,
        }
    }

    pub fn with_sketch_k(mut self, k: u16) -> Self {
        self.sketch_k = k;
        self
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsProvider> {
        &self.metrics
    }

    fn retained_key(&self, record: &TelemetryRecord) -> Vec<(String, AttributeValue)> {
        record
            .attributes
            .iter()
            .filter(|(k, _)| !self.source_fields.iter().any(|s| *s == **k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn emit(&self, group: GroupState) -> TelemetryRecord {
        let mut out = TelemetryRecord::new();
        for (key, value) in group.retained {
            out.attributes.insert(key, value);
        }
        out.attributes
            .insert(ROLLUP_COUNT_KEY.to_string(), AttributeValue::Int(group.count));
        for field in &self.source_fields {
            let Some(stats) = group.fields.get(field) else {
                continue;
            };
            if stats.parsed_count == 0 {
                // Every value for this field in this group was unparseable:
                // keep `rollup_count`, omit this field's aggregate keys.
                continue;
            }
            out.attributes.insert(
                aggregate_field(field, SUM_SUFFIX),
                AttributeValue::Float(stats.sum),
            );
            out.attributes.insert(
                aggregate_field(field, MIN_SUFFIX),
                AttributeValue::Float(stats.min),
            );
            out.attributes.insert(
                aggregate_field(field, MAX_SUFFIX),
                AttributeValue::Float(stats.max),
            );
            out.attributes.insert(
                aggregate_field(field, SOS_SUFFIX),
                AttributeValue::Float(stats.sum_of_squares),
            );
            out.attributes.insert(
                aggregate_field(field, SKETCH_SUFFIX),
                AttributeValue::Str(stats.sketch.to_base64()),
            );
        }
        out
    }
}

impl LogsProcessor for RollupProcessor {
    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities { mutates_data: true }
    }

    fn consume_logs(&self, records: Vec<TelemetryRecord>) -> Result<Vec<TelemetryRecord>, DataPlaneError> {
        let mut groups: HashMap<Vec<(String, AttributeValue)>, GroupState> = HashMap::new();
        let mut order: Vec<Vec<(String, AttributeValue)>> = Vec::new();

        for record in records {
            let key = self.retained_key(&record);
            let group = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                GroupState {
                    retained: key,
                    count: 0,
                    fields: HashMap::new(),
                }
            });
            group.count += 1;

            for field in &self.source_fields {
                let Some(raw) = record.attributes.get(field) else {
                    continue;
                };
                match raw.as_f64() {
                    Some(value) => {
                        group
                            .fields
                            .entry(field.clone())
                            .or_insert_with(|| FieldStats::new(self.sketch_k))
                            .observe(value);
                    }
                    None => {
                        self.parse_errors.increment(&[]);
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(order.len());
        for key in order {
            if let Some(group) = groups.remove(&key) {
                out.push(self.emit(group));
            }
        }
        Ok(out)
    }
}
