use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::layer::SentryLayer;
use crate::sink::ErrorReportingSink;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// Configuration of the installed subscriber.
///
/// **Fields**
/// - `min_level`: most verbose level forwarded to the sink. Events below
///   it produce neither breadcrumbs nor reports.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to the [`SentryLayer`] and events are also printed to the
///   console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::TRACE,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to `sink`.
///
/// **Parameters**
/// - `sink`: the [`ErrorReportingSink`] receiving every event.
/// - `config`: [`LayerConfig`] controlling filtering and console output.
///
/// **Returns**
/// - `Err(SinkError::Subscriber)` if a global subscriber is already set.
pub fn init_tracing_with_config(
    sink: Arc<ErrorReportingSink>,
    config: LayerConfig,
) -> Result<(), SinkError> {
    let layer = SentryLayer::new(sink).with_filter(LevelFilter::from_level(config.min_level));

    // Two subscriber shapes, one per console setting, to keep the types simple.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Install the subscriber with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<ErrorReportingSink>) -> Result<(), SinkError> {
    init_tracing_with_config(sink, LayerConfig::default())
}

/// Build a Sentry-backed sink from the `SENTRY_SINK_*` environment
/// variables and install it with default settings.
///
/// The returned sink can be used to [`flush`](ErrorReportingSink::flush)
/// before the process exits.
pub fn init_from_env() -> Result<Arc<ErrorReportingSink>, SinkError> {
    let sink = Arc::new(ErrorReportingSink::new(&SinkConfig::from_env())?);
    init_tracing(Arc::clone(&sink))?;
    Ok(sink)
}
