//! Observability facade: host-injected interfaces for metrics and logging.
//!
//! - [`logging`]: structured log events and the [`logging::Logger`] contract, with a
//!   default implementation bridging to `tracing`.
//! - [`metrics`]: counter/gauge/histogram contracts, with a no-op default
//!   ([`metrics::NoopMetrics`]).
//! - [`attributes`]: the key-value modeling shared by metrics and logging.
//!
//! Both traits are injected as `Arc<dyn Trait>` into the components the
//! composition root builds; the crate itself holds no process-wide
//! singleton of either.

pub mod attributes;
pub mod logging;
pub mod metrics;

pub use attributes::{
    AttributeKey, AttributeSet, KeyValue, MetricAttributeValue, OwnedAttributeSet,
};
pub use logging::{LogField, LogRecord, LogSeverity, Logger, TracingLogger};
pub use metrics::{Counter, Gauge, Histogram, InstrumentDescriptor, MetricsProvider, NoopMetrics};
