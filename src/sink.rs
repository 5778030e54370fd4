use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::{Breadcrumb, ReportClient, ReportId, ROOT_LOGGER};
use crate::config::SinkConfig;
use crate::env::{command_line_args, environment_tags};
use crate::error::SinkError;
use crate::record::LogEvent;
use crate::report::ErrorReport;
use crate::sentry_client::SentryClient;
use crate::tags;

/// Target of the sink's own diagnostic events. [`SentryLayer`](crate::layer::SentryLayer)
/// never forwards events on this target.
pub const DIAGNOSTIC_TARGET: &str = "tracing_sentry_sink::internal";

/// Callback receiving every failure the sink swallows.
pub type ErrorHandler = Arc<dyn Fn(&SinkError) + Send + Sync>;

/// Default failure handler: one diagnostic `tracing` event per failure.
pub fn log_failure(err: &SinkError) {
    tracing::error!(target: DIAGNOSTIC_TARGET, error = %err, "unable to send error to Sentry");
}

/// Forwards log events to an error-reporting backend.
///
/// Every event with a message becomes a breadcrumb; events at
/// [`Severity::Error`](crate::level::Severity::Error) and above are also
/// sent as an [`ErrorReport`]. Writing never fails: errors and panics are
/// handed to the failure handler.
pub struct ErrorReportingSink {
    client: Mutex<Box<dyn ReportClient>>,
    on_error: ErrorHandler,
    attempted: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Report counters of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkStats {
    pub attempted: u64,
    pub sent: u64,
    pub failed: u64,
}

impl ErrorReportingSink {
    /// Build a sink that reports to Sentry.
    ///
    /// **Parameters**
    /// - `config`: DSN, release and environment of the reports.
    ///
    /// **Returns**
    /// - `Err(..)` if the DSN is missing or malformed.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = SentryClient::new(config)?;
        Ok(Self::with_client(client))
    }

    /// Build a sink over any [`ReportClient`]. The host environment tags
    /// are applied to the client once, here.
    pub fn with_client<C: ReportClient + 'static>(mut client: C) -> Self {
        for (key, value) in environment_tags() {
            client.set_tag(key, &value);
        }

        ErrorReportingSink {
            client: Mutex::new(Box::new(client)),
            on_error: Arc::new(log_failure),
            attempted: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Replace the failure handler.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SinkError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    /// Add a tag sent by every sink in the process from now on.
    pub fn add_tag(key: impl Into<String>, value: impl Into<String>) {
        tags::add_tag(key, value);
    }

    /// Record `event`, sending a report when it is an error or worse.
    ///
    /// Never fails and never panics; failures go to the failure handler.
    /// A panic outside the send itself (tags, breadcrumbs) is reported but
    /// not counted in [`stats`](Self::stats).
    pub fn write(&self, event: &LogEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_write(event)));
        let err = match outcome {
            Ok(Ok(_)) => return,
            Ok(Err(err)) => err,
            Err(payload) => SinkError::Panicked(panic_message(payload.as_ref())),
        };
        (self.on_error)(&err);
    }

    /// Same pipeline as [`write`](Self::write), with the outcome returned.
    ///
    /// **Returns**
    /// - `Ok(None)` if the event was below the report threshold.
    /// - `Ok(Some(id))` with the remote id of the report.
    /// - `Err(..)` if the client failed to send, including
    ///   `SinkError::Panicked` when the client panicked while sending.
    pub fn try_write(&self, event: &LogEvent) -> Result<Option<ReportId>, SinkError> {
        {
            let mut client = self.lock_client();
            tags::apply_to(&mut **client);
        }

        if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
            let breadcrumb = Breadcrumb::navigation(
                event.logger.as_str(),
                event.severity.breadcrumb_level(),
                message,
                event.timestamp,
            );
            self.lock_client().add_breadcrumb(breadcrumb);
        }

        if !event.severity.is_reportable() {
            return Ok(None);
        }

        let report = ErrorReport::from_event(event, &command_line_args());

        self.attempted.fetch_add(1, Ordering::Relaxed);
        let result = {
            let mut client = self.lock_client();
            client.set_logger(&event.logger);
            let result = panic::catch_unwind(AssertUnwindSafe(|| client.capture(report)))
                .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))));
            client.set_logger(ROOT_LOGGER);
            result
        };

        match result {
            Ok(id) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                if let Some(exception) = &event.exception {
                    exception.mark_reported(&id);
                }
                Ok(Some(id))
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Wait up to `timeout` for queued reports to be delivered.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.lock_client().flush(timeout)
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn lock_client(&self) -> MutexGuard<'_, Box<dyn ReportClient>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::memory_client::MemoryClient;

    #[test]
    fn logger_is_restored_after_failed_send() {
        let client = MemoryClient::new();
        client.fail_sends("offline");
        let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});

        let event = LogEvent::new(Severity::Error, "app::jobs").with_message("boom");
        assert!(sink.try_write(&event).is_err());
        assert_eq!(client.logger(), ROOT_LOGGER);
        assert_eq!(sink.stats(), SinkStats { attempted: 1, sent: 0, failed: 1 });
    }

    #[derive(Default)]
    struct ExplodingClient {
        logger: Arc<Mutex<String>>,
        panic_on_breadcrumb: bool,
    }

    impl ReportClient for ExplodingClient {
        fn set_tag(&mut self, _key: &str, _value: &str) {}

        fn add_breadcrumb(&mut self, _breadcrumb: Breadcrumb) {
            if self.panic_on_breadcrumb {
                panic!("trail corrupted");
            }
        }

        fn set_logger(&mut self, logger: &str) {
            *self.logger.lock().unwrap() = logger.to_string();
        }

        fn capture(&mut self, _report: ErrorReport) -> Result<ReportId, SinkError> {
            panic!("transport exploded");
        }
    }

    #[test]
    fn panic_while_sending_counts_once_and_restores_logger() {
        let client = ExplodingClient::default();
        let logger = Arc::clone(&client.logger);
        let failures = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&failures);
        let sink = ErrorReportingSink::with_client(client).on_error(move |err| {
            assert!(matches!(err, SinkError::Panicked(msg) if msg == "transport exploded"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let event = LogEvent::new(Severity::Error, "app::jobs").with_message("boom");
        sink.write(&event);

        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(sink.stats(), SinkStats { attempted: 1, sent: 0, failed: 1 });
        assert_eq!(*logger.lock().unwrap(), ROOT_LOGGER);

        assert!(matches!(sink.try_write(&event), Err(SinkError::Panicked(_))));
        assert_eq!(sink.stats(), SinkStats { attempted: 2, sent: 0, failed: 2 });
    }

    #[test]
    fn panic_before_sending_is_reported_but_not_counted() {
        let client = ExplodingClient { panic_on_breadcrumb: true, ..Default::default() };
        let failures = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&failures);
        let sink = ErrorReportingSink::with_client(client).on_error(move |err| {
            assert!(matches!(err, SinkError::Panicked(msg) if msg == "trail corrupted"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sink.write(&LogEvent::new(Severity::Error, "app").with_message("boom"));
        sink.write(&LogEvent::new(Severity::Info, "app").with_message("still here"));

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(sink.stats(), SinkStats::default());
    }

    #[test]
    fn environment_tags_are_applied_once() {
        let client = MemoryClient::new();
        let _sink = ErrorReportingSink::with_client(client.clone());
        let tags = client.tags();
        for key in ["culture", "64_process", "is_server", "is_admin", "is_gui"] {
            assert!(tags.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("bad state");
        assert_eq!(panic_message(payload.as_ref()), "bad state");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
