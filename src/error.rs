use thiserror::Error;

/// The data plane's unified error domain: registration-time configuration
/// failures, cache lookups, transient per-record failures, and unreachable
/// states.
///
/// Reject-style decisions (rate-limited / concurrency-limited / deadline
/// exceeded) do not live here: they are ordinary values of
/// [`crate::engine::CheckResponse`] and never surface as `Result::Err` — see
/// each component's Non-goals notes.
#[derive(Debug, Error)]
pub enum DataPlaneError {
    /// Registration-time validation failure: an invalid regex, a duplicate
    /// `LimiterId`, an inconsistent envelope configuration, and the like.
    #[error("invalid configuration for {subject}: {reason}")]
    ConfigInvalid { subject: &'static str, reason: String },

    /// A lookup missed, e.g. the entity cache has no entry for a given IP or
    /// name.
    #[error("not found: {0}")]
    NotFound(String),

    /// A recoverable, per-record failure: a notifier payload failed to
    /// decode, a sketch failed to merge, an attribute value didn't parse as a
    /// number. Callers count and drop the offending record; they never abort
    /// the whole batch over this.
    #[error("transient failure in {component}: {reason}")]
    Transient {
        component: &'static str,
        reason: String,
    },

    /// A state that should be unreachable. The full state is logged and the
    /// owning policy instance is marked degraded; the process is never
    /// aborted over it.
    #[error("unreachable state in {component}: {detail}")]
    Fatal {
        component: &'static str,
        detail: String,
    },

    /// A notifier payload failed to deserialize.
    #[error("failed to decode configuration payload")]
    Decode(#[from] serde_json::Error),
}

impl DataPlaneError {
    pub fn config_invalid(subject: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            subject,
            reason: reason.into(),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn transient(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Transient {
            component,
            reason: reason.into(),
        }
    }

    pub fn fatal(component: &'static str, detail: impl Into<String>) -> Self {
        Self::Fatal {
            component,
            detail: detail.into(),
        }
    }
}

pub type DataPlaneResult<T> = Result<T, DataPlaneError>;
