//! EMA component (C7): a two-stage exponential moving average filter with a
//! warm-up period and min/max envelope correction, driven by the policy
//! runtime's tick scheduler.
//!
//! Grounded directly in `pkg/policies/controlplane/components/ema.go`. One
//! deliberate deviation, called out as a REDESIGN FLAG in the design notes:
//! the Go original `logger.Panic()`s on an unknown stage value reached
//! through its `switch` default case. This rewrite makes [`Stage`] an
//! exhaustive two-variant enum instead, so there is no default branch and no
//! way to reach an "impossible" stage at all.

use thiserror::Error;

use super::{Component, PortToValue, Reading, TickInfo, read_single_value_port};

#[derive(Debug, Error)]
pub enum EmaError {
    /// The one truly unreachable state the original carries a `logger.Panic`
    /// for: the EMA stage is entered with a valid input but an invalid
    /// `last_good_output`. Per §7's `Fatal` error kind this is logged and
    /// returned rather than panicking; the caller is expected to mark the
    /// owning policy instance degraded.
    #[error("ema: last_good_output is invalid while in the EMA stage")]
    LastGoodOutputInvalid,

    /// Both envelope bounds are set but `min_envelope > max_envelope`: a
    /// `ConfigInvalid`-class condition (§7) surfaced through the `Result`
    /// rather than silently downgraded to an invalid reading, matching the
    /// Go original's `applyEnvelope`/`SetMin` returning an error here.
    #[error("ema: envelope is invalid, min_envelope ({min}) > max_envelope ({max})")]
    InvalidEnvelope { min: f64, max: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    WarmUp {
        sum: f64,
        count: u32,
        warmup_ticks: u32,
    },
    Ema {
        invalid_count: u32,
    },
}

/// Two-stage EMA filter. See §4.6 for the full state-machine description.
pub struct EmaComponent {
    alpha: f64,
    warm_up_window_ticks: u32,
    ema_window_ticks: u32,
    correction_factor_on_min_violation: f64,
    correction_factor_on_max_violation: f64,
    stage: Stage,
    last_good_output: Reading,
}

impl EmaComponent {
    /// `warm_up_window` and `ema_window` are durations, converted to tick
    /// counts using `evaluation_interval`, matching
    /// `math.Ceil(window / evaluationPeriod)` in the original. `ema_window`
    /// is floored at one tick so `alpha` never divides by one (a zero-length
    /// window would otherwise make every input the whole signal).
    pub fn new(
        warm_up_window: std::time::Duration,
        ema_window: std::time::Duration,
        evaluation_interval: std::time::Duration,
        correction_factor_on_min_violation: f64,
        correction_factor_on_max_violation: f64,
    ) -> Self {
        let interval_secs = evaluation_interval.as_secs_f64().max(f64::MIN_POSITIVE);
        let ema_window_ticks = (ema_window.as_secs_f64() / interval_secs).ceil().max(1.0) as u32;
        let warm_up_window_ticks = (warm_up_window.as_secs_f64() / interval_secs).ceil() as u32;
        let alpha = 2.0 / (ema_window_ticks as f64 + 1.0);
        Self {
            alpha,
            warm_up_window_ticks,
            ema_window_ticks,
            correction_factor_on_min_violation,
            correction_factor_on_max_violation,
            stage: Stage::WarmUp {
                sum: 0.0,
                count: 0,
                warmup_ticks: 0,
            },
            last_good_output: Reading::invalid(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    fn apply_envelope(
        &self,
        output: Reading,
        min_envelope: Reading,
        max_envelope: Reading,
    ) -> Result<Reading, EmaError> {
        if !output.valid() {
            return Ok(output);
        }
        let value = output.value();
        match (min_envelope.valid(), max_envelope.valid()) {
            (true, true) => {
                let (min, max) = (min_envelope.value(), max_envelope.value());
                if min > max {
                    tracing::error!(min, max, "ema: envelope is invalid, min > max");
                    return Err(EmaError::InvalidEnvelope { min, max });
                }
                Ok(if value > max {
                    Reading::new(value * self.correction_factor_on_max_violation)
                } else if value < min {
                    Reading::new(value * self.correction_factor_on_min_violation)
                } else {
                    output
                })
            }
            (false, true) => Ok(if value > max_envelope.value() {
                Reading::new(value * self.correction_factor_on_max_violation)
            } else {
                output
            }),
            (true, false) => Ok(if value < min_envelope.value() {
                Reading::new(value * self.correction_factor_on_min_violation)
            } else {
                output
            }),
            (false, false) => Ok(output),
        }
    }
}

impl Component for EmaComponent {
    type Error = EmaError;

    fn execute(&mut self, inputs: PortToValue, _tick: TickInfo) -> Result<PortToValue, EmaError> {
        let input = read_single_value_port(&inputs, "input");
        let max_envelope = read_single_value_port(&inputs, "max_envelope");
        let min_envelope = read_single_value_port(&inputs, "min_envelope");

        let mut output;
        let mut transition_to_ema = false;
        let mut reset_requested = false;

        match &mut self.stage {
            Stage::WarmUp {
                sum,
                count,
                warmup_ticks,
            } => {
                *warmup_ticks += 1;
                if input.valid() {
                    *sum += input.value();
                    *count += 1;
                    if *warmup_ticks >= self.warm_up_window_ticks {
                        transition_to_ema = true;
                    }
                    output = if *count > 0 {
                        Reading::new(*sum / f64::from(*count))
                    } else {
                        Reading::invalid()
                    };
                } else {
                    reset_requested = true;
                    output = Reading::invalid();
                }
            }
            Stage::Ema { invalid_count } => {
                if input.valid() {
                    if !self.last_good_output.valid() {
                        tracing::error!("ema: unreachable state, see EmaError::LastGoodOutputInvalid");
                        return Err(EmaError::LastGoodOutputInvalid);
                    }
                    let value = self.alpha * input.value()
                        + (1.0 - self.alpha) * self.last_good_output.value();
                    output = Reading::new(value);
                } else {
                    *invalid_count += 1;
                    output = self.last_good_output;
                    if *invalid_count >= self.ema_window_ticks {
                        reset_requested = true;
                    }
                }
            }
        }

        if transition_to_ema {
            self.stage = Stage::Ema { invalid_count: 0 };
        }
        if reset_requested {
            self.stage = Stage::WarmUp {
                sum: 0.0,
                count: 0,
                warmup_ticks: 0,
            };
            self.last_good_output = Reading::invalid();
        }

        output = self.apply_envelope(output, min_envelope, max_envelope)?;

        if output.valid() {
            self.last_good_output = output;
        }

        let mut out = PortToValue::new();
        out.insert("output".to_string(), vec![output]);
        Ok(out)
    }
}
