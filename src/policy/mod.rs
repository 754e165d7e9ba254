//! The policy runtime's component model: `Reading`, `PortToValue`,
//! `TickInfo` and the `Component` trait every signal-processing element
//! (of which [`ema::EmaComponent`] is the one fully specified here)
//! implements.
//!
//! Grounded in `pkg/policies/controlplane/runtime`: a component is a
//! deterministic function of `(inputs, prior state, tick)`, driven
//! single-threaded and cooperatively by a per-policy ticker — never
//! blocking, never racing with itself.

pub mod ema;

use std::collections::HashMap;

/// A value-or-invalid pair, mirroring `runtime.Reading`. Arithmetic on an
/// invalid reading always produces an invalid reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    value: f64,
    valid: bool,
}

impl Reading {
    pub fn new(value: f64) -> Self {
        Self { value, valid: true }
    }

    pub fn invalid() -> Self {
        Self {
            value: 0.0,
            valid: false,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Panics if called on an invalid reading; callers must check
    /// [`Reading::valid`] first, the same discipline the Go runtime's
    /// `Reading.Value()` expects of its callers.
    pub fn value(&self) -> f64 {
        debug_assert!(self.valid, "read of an invalid Reading");
        self.value
    }
}

/// Mapping from named port to the ordered list of readings delivered on it
/// for one tick, mirroring `runtime.PortToValue`.
pub type PortToValue = HashMap<String, Vec<Reading>>;

/// Reads the single value expected on `port`, mirroring
/// `PortToValue.ReadSingleValuePort`: an absent port or an empty list is
/// treated as an invalid reading rather than an error, since a policy graph
/// may leave an optional input (e.g. an envelope bound) unconnected.
pub fn read_single_value_port(ports: &PortToValue, port: &str) -> Reading {
    ports
        .get(port)
        .and_then(|readings| readings.first())
        .copied()
        .unwrap_or_else(Reading::invalid)
}

/// Monotonic tick counter plus the policy's evaluation interval, mirroring
/// `runtime.TickInfo`. Every [`Component::execute`] call receives one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickInfo {
    pub tick: u64,
    pub evaluation_interval: std::time::Duration,
}

/// A single-threaded, deterministic signal-processing element in the policy
/// graph. `execute` must be a pure function of `(inputs, prior state, tick)`:
/// no I/O, no blocking, no hidden shared state.
pub trait Component {
    type Error: std::error::Error;

    fn execute(
        &mut self,
        inputs: PortToValue,
        tick: TickInfo,
    ) -> Result<PortToValue, Self::Error>;
}
