use chrono::Utc;
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::exception::CapturedError;
use crate::level::Severity;
use crate::record::LogEvent;
use crate::sink::{ErrorReportingSink, DIAGNOSTIC_TARGET};

/// Boolean field that promotes an `error!` event to [`Severity::Fatal`].
pub const FATAL_FIELD: &str = "fatal";

thread_local! {
    static IN_WRITE: Cell<bool> = Cell::new(false);
}

/// `tracing_subscriber` layer that hands every event to an
/// [`ErrorReportingSink`].
///
/// Events are converted into [`LogEvent`]s on the emitting thread and
/// written synchronously. The sink's own diagnostic events, and events
/// emitted while this thread is already inside the sink, are skipped.
pub struct SentryLayer {
    sink: Arc<ErrorReportingSink>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Diagnostic or re-entrant events that were not forwarded.
    pub skipped_events: Arc<AtomicU64>,
}

impl SentryLayer {
    pub fn new(sink: Arc<ErrorReportingSink>) -> Self {
        SentryLayer {
            sink,
            total_events: Arc::new(AtomicU64::new(0)),
            skipped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn sink(&self) -> &Arc<ErrorReportingSink> {
        &self.sink
    }
}

struct WriteGuard;

impl WriteGuard {
    fn enter() -> Option<WriteGuard> {
        if IN_WRITE.with(|flag| flag.replace(true)) {
            None
        } else {
            Some(WriteGuard)
        }
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        IN_WRITE.with(|flag| flag.set(false));
    }
}

impl<S> Layer<S> for SentryLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if meta.target() == DIAGNOSTIC_TARGET {
            self.skipped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Some(_guard) = WriteGuard::enter() else {
            self.skipped_events.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut severity = Severity::from(meta.level());
        if visitor.fatal && severity == Severity::Error {
            severity = Severity::Fatal;
        }

        let log_event = LogEvent {
            timestamp: Utc::now(),
            severity,
            logger: meta.target().to_string(),
            message: visitor.message,
            exception: visitor.exception,
            properties: visitor.fields,
            module_path: meta.module_path().map(|s| s.to_string()),
            file: meta.file().map(|s| s.to_string()),
            line: meta.line(),
        };

        self.sink.write(&log_event);
    }
}

/// Collects the fields of a `tracing` event.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: BTreeMap<String, Value>,
    pub message: Option<String>,
    pub exception: Option<CapturedError>,
    pub fatal: bool,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() {
            // Keep the caller's instance so report markers land on it.
            let captured = match value.downcast_ref::<CapturedError>() {
                Some(captured) => captured.clone(),
                None => CapturedError::from_error(value),
            };
            self.exception = Some(captured);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}
