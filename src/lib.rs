#![doc = "waypoint-core: the flow-control and telemetry-aggregation data plane for one service instance."]
#![doc = ""]
#![doc = "Eight components, each independently testable and none aware of how the"]
#![doc = "others are assembled:"]
#![doc = ""]
#![doc = "- [`selector`] (C1) matches a request's control point/service/labels against"]
#![doc = "  registered classifiers and limiters, breaking ties by [`selector::LimiterId`]."]
#![doc = "- [`entity`] (C2) is the dual-indexed (IP, name) concurrent cache fed by"]
#![doc = "  [`notifier`] write/remove events."]
#![doc = "- [`engine`] (C3) is the admission pipeline: classify, consume rate limiters,"]
#![doc = "  acquire concurrency limiters, decide."]
#![doc = "- [`limiter`] (C4) holds the token-bucket rate limiter and the RAII-guarded"]
#![doc = "  concurrency limiter [`engine`] drives."]
#![doc = "- [`telemetry::rollup`] (C5), [`telemetry::enrichment`] (C6) and"]
#![doc = "  [`telemetry::metrics_processor`] (C8) are `telemetry::LogsProcessor`"]
#![doc = "  stages over one batch of [`telemetry::TelemetryRecord`]s."]
#![doc = "- [`policy::ema`] (C7) is a tick-driven EMA filter component in the policy"]
#![doc = "  runtime's signal-processing graph."]
#![doc = ""]
#![doc = "[`composition`] wires concrete instances of all eight together with this"]
#![doc = "crate's [`observability`] facade and owns their start/shutdown order."]

pub mod composition;
pub mod engine;
pub mod entity;
pub mod error;
pub mod limiter;
pub mod notifier;
pub mod observability;
pub mod policy;
pub mod selector;
pub mod telemetry;

pub use engine::{CheckResponse, Decision, FlowEngine, RejectReason};
pub use entity::{Entity, EntityCache};
pub use error::{DataPlaneError, DataPlaneResult};
pub use limiter::{ConcurrencyGuard, ConcurrencyLimiter, RateLimiter};
pub use notifier::{EventKind, JsonUnmarshaller, NotifierEvent, PrefixNotifiee, Unmarshaller};
pub use selector::{LabelMatcher, LimiterId, Selector, SelectorIndex};
