use super::attributes::AttributeSet;
use std::borrow::Cow;
use std::error::Error as StdError;

/// Log severity, the intersection of OpenTelemetry `SeverityNumber` and `tracing`'s levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Structured log field set, reusing the same key-value machinery as metrics.
pub type LogField<'a> = AttributeSet<'a>;

/// One structured log record.
///
/// `message` is a `Cow<'a, str>` so callers can pass either a static string or
/// a dynamically built one; `error` is borrowed to avoid cloning the error
/// chain, so implementations must not outlive the call that produced it.
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub message: Cow<'a, str>,
    pub severity: LogSeverity,
    pub target: Option<Cow<'a, str>>,
    pub error: Option<&'a (dyn StdError + 'static)>,
    pub attributes: LogField<'a>,
}

impl<'a> LogRecord<'a> {
    pub fn new(
        message: impl Into<Cow<'a, str>>,
        severity: LogSeverity,
        target: Option<impl Into<Cow<'a, str>>>,
        error: Option<&'a (dyn StdError + 'static)>,
        attributes: LogField<'a>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            target: target.map(Into::into),
            error,
            attributes,
        }
    }
}

/// Core logging contract the rest of the crate depends on.
///
/// `log` is the only required method; `trace`/`debug`/`info`/`warn`/`error`/`fatal`
/// are convenience wrappers that build a [`LogRecord`] and call it, so every
/// path shares the same logic.
pub trait Logger: Send + Sync + 'static {
    fn log(&self, record: &LogRecord<'_>);

    fn trace(&self, message: &str) {
        self.trace_with_fields(message, &[]);
    }

    fn trace_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Trace,
            None::<Cow<'_, str>>,
            None,
            attributes,
        ));
    }

    fn debug(&self, message: &str) {
        self.debug_with_fields(message, &[]);
    }

    fn debug_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Debug,
            None::<Cow<'_, str>>,
            None,
            attributes,
        ));
    }

    fn info(&self, message: &str) {
        self.info_with_fields(message, &[]);
    }

    fn info_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Info,
            None::<Cow<'_, str>>,
            None,
            attributes,
        ));
    }

    fn warn(&self, message: &str) {
        self.warn_with_fields(message, &[]);
    }

    fn warn_with_fields(&self, message: &str, attributes: LogField<'_>) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Warn,
            None::<Cow<'_, str>>,
            None,
            attributes,
        ));
    }

    fn error(&self, message: &str, error: Option<&(dyn StdError + 'static)>) {
        self.error_with_fields(message, error, &[]);
    }

    fn error_with_fields(
        &self,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
        attributes: LogField<'_>,
    ) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Error,
            None::<Cow<'_, str>>,
            error,
            attributes,
        ));
    }

    fn fatal(&self, message: &str, error: Option<&(dyn StdError + 'static)>) {
        self.fatal_with_fields(message, error, &[]);
    }

    fn fatal_with_fields(
        &self,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
        attributes: LogField<'_>,
    ) {
        self.log(&LogRecord::new(
            message,
            LogSeverity::Fatal,
            None::<Cow<'_, str>>,
            error,
            attributes,
        ));
    }
}

/// Default [`Logger`] bridging to `tracing`.
///
/// The host installs whatever `tracing` subscriber it wants in `main` or a
/// test harness; this type never installs a global subscriber itself, it
/// only forwards structured records as `tracing` events, keeping with the
/// "no process-wide singletons" rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let target = record.target.as_deref().unwrap_or("waypoint_core");
        match record.severity {
            LogSeverity::Trace => {
                tracing::trace!(target: "waypoint_core", %target, message = %record.message)
            }
            LogSeverity::Debug => {
                tracing::debug!(target: "waypoint_core", %target, message = %record.message)
            }
            LogSeverity::Info => {
                tracing::info!(target: "waypoint_core", %target, message = %record.message)
            }
            LogSeverity::Warn => {
                tracing::warn!(target: "waypoint_core", %target, message = %record.message)
            }
            LogSeverity::Error | LogSeverity::Fatal => {
                if let Some(err) = record.error {
                    tracing::error!(target: "waypoint_core", %target, message = %record.message, error = %err)
                } else {
                    tracing::error!(target: "waypoint_core", %target, message = %record.message)
                }
            }
        }
    }
}
