use super::attributes::AttributeSet;
use std::sync::Arc;

/// Metadata describing one instrument, modeled on OpenTelemetry's Instrument Descriptor.
///
/// `name` should be globally unique, snake_case `namespace.metric_name`; the
/// descriptor itself is only valid for the duration of the call, implementations
/// must clone an owned copy if they need to keep it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstrumentDescriptor<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub unit: Option<&'a str>,
}

impl<'a> InstrumentDescriptor<'a> {
    pub const fn new(name: &'a str) -> Self {
        Self {
            name,
            description: None,
            unit: None,
        }
    }

    pub const fn with_description(mut self, description: &'a str) -> Self {
        self.description = Some(description);
        self
    }

    pub const fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Monotonically increasing counter, modeled on Prometheus Counter / OpenTelemetry `Counter`.
pub trait Counter: Send + Sync {
    fn add(&self, value: u64, attributes: AttributeSet<'_>);

    fn increment(&self, attributes: AttributeSet<'_>) {
        self.add(1, attributes);
    }
}

/// A gauge that can move up or down, corresponding to OpenTelemetry `UpDownCounter` / Prometheus Gauge.
pub trait Gauge: Send + Sync {
    fn set(&self, value: f64, attributes: AttributeSet<'_>);
    fn increment(&self, delta: f64, attributes: AttributeSet<'_>);
    fn decrement(&self, delta: f64, attributes: AttributeSet<'_>);
}

/// Histogram metric, aligned with OpenTelemetry `Histogram`, for latency/size distributions.
pub trait Histogram: Send + Sync {
    fn record(&self, value: f64, attributes: AttributeSet<'_>);
}

/// Abstraction over instrument creation shared by every backend (Prometheus,
/// StatsD, OpenTelemetry Collector). Booting the backend process and serving
/// a scrape endpoint are the host's job, not this crate's; the host injects
/// an implementation at composition time.
pub trait MetricsProvider: Send + Sync + 'static {
    fn counter(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Counter>;
    fn gauge(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Gauge>;
    fn histogram(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Histogram>;

    /// Records a counter delta directly so the caller doesn't need to hold the `Arc`; default falls back to `counter().add`.
    fn record_counter_add(
        &self,
        descriptor: &InstrumentDescriptor<'_>,
        value: u64,
        attributes: AttributeSet<'_>,
    ) {
        self.counter(descriptor).add(value, attributes);
    }

    fn record_gauge_set(
        &self,
        descriptor: &InstrumentDescriptor<'_>,
        value: f64,
        attributes: AttributeSet<'_>,
    ) {
        self.gauge(descriptor).set(value, attributes);
    }

    fn record_histogram(
        &self,
        descriptor: &InstrumentDescriptor<'_>,
        value: f64,
        attributes: AttributeSet<'_>,
    ) {
        self.histogram(descriptor).record(value, attributes);
    }
}

struct NoopInstrument;

impl Counter for NoopInstrument {
    fn add(&self, _value: u64, _attributes: AttributeSet<'_>) {}
}

impl Gauge for NoopInstrument {
    fn set(&self, _value: f64, _attributes: AttributeSet<'_>) {}
    fn increment(&self, _delta: f64, _attributes: AttributeSet<'_>) {}
    fn decrement(&self, _delta: f64, _attributes: AttributeSet<'_>) {}
}

impl Histogram for NoopInstrument {
    fn record(&self, _value: f64, _attributes: AttributeSet<'_>) {}
}

/// No-op metrics provider, for tests, benchmarks, and composition roots not yet wired to a real backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {
    fn counter(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Counter> {
        Arc::new(NoopInstrument)
    }

    fn gauge(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Gauge> {
        Arc::new(NoopInstrument)
    }

    fn histogram(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Histogram> {
        Arc::new(NoopInstrument)
    }
}
