use std::error::Error;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use tracing_sentry_sink::level::{BreadcrumbLevel, ReportLevel};
use tracing_sentry_sink::memory_client::MemoryClient;
use tracing_sentry_sink::sink::DIAGNOSTIC_TARGET;
use tracing_sentry_sink::{CapturedError, ErrorReportingSink, SentryLayer};

fn with_layer<F: FnOnce()>(sink: ErrorReportingSink, f: F) -> SentryLayerCounters {
    let layer = SentryLayer::new(Arc::new(sink));
    let counters = SentryLayerCounters {
        total: Arc::clone(&layer.total_events),
        skipped: Arc::clone(&layer.skipped_events),
    };
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    counters
}

struct SentryLayerCounters {
    total: Arc<std::sync::atomic::AtomicU64>,
    skipped: Arc<std::sync::atomic::AtomicU64>,
}

#[test]
fn info_becomes_breadcrumb_and_error_becomes_report() {
    let client = MemoryClient::new();
    let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});

    with_layer(sink, || {
        info!("starting up");
        debug!(package = "vlc", "resolving manifest");
        error!(user_id = 42, reason = "invalid password", "authentication failed");
    });

    let crumbs = client.breadcrumbs();
    let messages: Vec<_> = crumbs.iter().map(|c| c.message.as_str()).collect();
    assert_eq!(messages, vec!["starting up", "resolving manifest", "authentication failed"]);
    assert_eq!(crumbs[0].level, BreadcrumbLevel::Info);
    assert_eq!(crumbs[0].source, module_path!());

    let reports = client.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0].report;
    assert_eq!(report.level, ReportLevel::Error);
    assert_eq!(report.message.as_deref(), Some("authentication failed"));
    assert_eq!(report.extra["user_id"], serde_json::Value::from("42"));
    assert_eq!(report.extra["reason"], serde_json::Value::from("invalid password"));
    assert_eq!(report.module_path.as_deref(), Some(module_path!()));
    assert!(report.location.as_deref().unwrap().starts_with(file!()));
    assert_eq!(reports[0].logger, module_path!());
}

#[test]
fn fatal_field_escalates_error() {
    let client = MemoryClient::new();
    let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});

    with_layer(sink, || {
        error!(fatal = true, "database unreachable");
        warn!(fatal = true, "only a warning");
    });

    let reports = client.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report.level, ReportLevel::Fatal);
    assert!(!reports[0].report.extra.contains_key("fatal"));
    assert_eq!(client.breadcrumbs()[0].level, BreadcrumbLevel::Critical);
}

#[test]
fn captured_error_field_is_marked_after_report() {
    let client = MemoryClient::new();
    let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});
    let err = CapturedError::new("InstallError", "installer exited with 1603").with_data("package", "vlc");

    with_layer(sink, || {
        error!(error = &err as &(dyn Error + 'static), "install failed");
    });

    assert!(err.is_reported());
    let reports = client.reports();
    assert_eq!(err.report_id(), Some(reports[0].id.to_string()));
    assert_eq!(reports[0].report.extra["package"], serde_json::Value::from("vlc"));
}

#[test]
fn foreign_error_field_is_captured() {
    let client = MemoryClient::new();
    let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});
    let err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");

    with_layer(sink, || {
        error!(error = &err as &(dyn Error + 'static), "cannot write cache");
    });

    let reports = client.reports();
    let exception = reports[0].report.exception.as_ref().expect("exception");
    assert_eq!(exception.ty(), "Custom");
    assert_eq!(exception.value(), "access denied");
}

#[test]
fn erased_error_field_keeps_concrete_type() {
    let client = MemoryClient::new();
    let sink = ErrorReportingSink::with_client(client.clone()).on_error(|_| {});
    let err = "forty-two".parse::<u32>().unwrap_err();

    with_layer(sink, || {
        error!(error = &err as &(dyn Error + 'static), "bad retry count");
    });

    let reports = client.reports();
    let exception = reports[0].report.exception.as_ref().expect("exception");
    assert_eq!(exception.ty(), "ParseIntError");
    assert_eq!(exception.value(), err.to_string());
}

#[test]
fn diagnostic_events_are_not_forwarded() {
    let client = MemoryClient::new();
    client.fail_sends("offline");
    // default handler logs on the diagnostic target from inside the layer
    let sink = ErrorReportingSink::with_client(client.clone());

    let counters = with_layer(sink, || {
        error!(target: DIAGNOSTIC_TARGET, "should be ignored");
        error!("send fails");
    });

    assert!(client.reports().is_empty());
    let messages: Vec<_> = client.breadcrumbs().into_iter().map(|c| c.message).collect();
    assert_eq!(messages, vec!["send fails".to_string()]);
    // nested dispatch of the failure event depends on the dispatcher kind
    assert!(counters.total.load(Ordering::Relaxed) >= 2);
    assert!(counters.skipped.load(Ordering::Relaxed) >= 1);
}
