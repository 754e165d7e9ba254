//! Telemetry processor pipeline: the in-memory `LogRecord` model the rollup
//! (C5), enrichment (C6) and metrics-join (C8) processors all consume, plus
//! the shared `{Capabilities, Start, Shutdown, Consume}` processor contract
//! from `pkg/otelcollector`'s `component.LogsProcessor` / `consumer.Capabilities`
//! pairing.
//!
//! Named `TelemetryRecord` rather than `LogRecord` to avoid colliding with
//! [`crate::observability::LogRecord`], which is this crate's own structured
//! *logging* event, a different concept from a telemetry data record flowing
//! through the pipeline.

pub mod enrichment;
pub mod metrics_processor;
pub mod rollup;
pub mod sketch;

use std::collections::BTreeMap;

use crate::error::DataPlaneError;

/// One attribute value on a [`TelemetryRecord`]. Mirrors the four OTel
/// `pcommon.Value` scalar kinds this crate's processors actually read or
/// write, plus the string-list shape `aperture.services` uses.
#[derive(Clone, Debug)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StrList(Vec<String>),
}

impl AttributeValue {
    /// Parses this value as a number the way the rollup processor does:
    /// decimal strings are parsed, ints/floats pass through, bools and
    /// string-lists are never numeric. Returns `None` for anything that
    /// isn't a finite number, including a literal `NaN` string — the rollup
    /// processor treats both the same way, as an unparseable value.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            AttributeValue::Str(s) => s.trim().parse::<f64>().ok()?,
            AttributeValue::Int(i) => *i as f64,
            AttributeValue::Float(f) => *f,
            AttributeValue::Bool(_) | AttributeValue::StrList(_) => return None,
        };
        if value.is_finite() { Some(value) } else { None }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::Str(a), AttributeValue::Str(b)) => a == b,
            (AttributeValue::Int(a), AttributeValue::Int(b)) => a == b,
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::StrList(a), AttributeValue::StrList(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl std::hash::Hash for AttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            AttributeValue::Str(s) => s.hash(state),
            AttributeValue::Int(i) => i.hash(state),
            AttributeValue::Float(f) => f.to_bits().hash(state),
            AttributeValue::Bool(b) => b.hash(state),
            AttributeValue::StrList(v) => v.hash(state),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// Abstract view of one telemetry log record: an attribute map keyed by
/// well-known string keys (`entity_name`, `workload_duration_ms`, ...).
/// `BTreeMap` rather than `HashMap` so that grouping keys built from a
/// record's retained attributes, and the rollup processor's serialized
/// sketch bytes, are deterministic across runs for an identical input
/// sequence, as required by this component's round-trip property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryRecord {
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Declares whether a processor mutates the records it consumes, mirroring
/// `consumer.Capabilities`. A processor with `mutates_data: false` must treat
/// its input as read-only and is free to pass through the same allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorCapabilities {
    pub mutates_data: bool,
}

/// The telemetry pipeline's processor contract:
/// `{Capabilities, Start(ctx), Shutdown(ctx), ConsumeLogs(ctx, data) -> error}`.
/// Only the logs signal is modeled here; metrics/traces consumption is out of
/// scope for this core (see the spec's Non-goals).
pub trait LogsProcessor: Send + Sync {
    fn capabilities(&self) -> ProcessorCapabilities;

    fn start(&self) -> Result<(), DataPlaneError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), DataPlaneError> {
        Ok(())
    }

    /// Consumes one batch and returns the (possibly mutated) batch to pass
    /// downstream. Per-record failures are never fatal to the batch: a
    /// processor drops or passes through the offending record and reports
    /// the failure through its own metrics hook instead of this `Result`.
    fn consume_logs(&self, records: Vec<TelemetryRecord>) -> Result<Vec<TelemetryRecord>, DataPlaneError>;
}
