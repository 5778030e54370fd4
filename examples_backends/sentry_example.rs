use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_sentry_sink::{init::init_tracing, CapturedError, ErrorReportingSink, SinkConfig};

fn main() {
    // Example DSN: https://key@o0.ingest.sentry.io/42
    let dsn = std::env::var("SENTRY_SINK_DSN")
        .unwrap_or_else(|_| "https://public@sentry.invalid/1".to_string());

    let config = SinkConfig::new(dsn).with_release(env!("CARGO_PKG_VERSION"));
    let sink = Arc::new(ErrorReportingSink::new(&config).expect("invalid SENTRY_SINK_DSN"));
    init_tracing(Arc::clone(&sink)).expect("install subscriber");

    ErrorReportingSink::add_tag("tenant", "example");

    info!("sentry example started");

    let err = CapturedError::from_error(&io::Error::new(io::ErrorKind::Other, "no space left on device"))
        .with_data("volume", "/var");
    error!(error = &err as &(dyn std::error::Error + 'static), "disk full");

    if err.is_reported() {
        println!("reported as {}", err.report_id().unwrap_or_default());
    }

    sink.flush(Duration::from_secs(2));
}
