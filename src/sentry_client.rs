use sentry::protocol::{Event, Exception};
use sentry::{ClientOptions, Hub, Scope};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{Breadcrumb, ReportClient, ReportId, ROOT_LOGGER};
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::exception::CapturedError;
use crate::report::ErrorReport;

/// [`ReportClient`] backed by the `sentry` crate.
///
/// Owns a private [`Hub`] bound to its own client, so tags and breadcrumbs
/// recorded here never leak into the process-global Sentry hub.
pub struct SentryClient {
    hub: Hub,
    logger: String,
}

impl SentryClient {
    /// Build a client from a [`SinkConfig`].
    ///
    /// With the `transport` feature the options go through
    /// [`sentry::apply_defaults`], which installs the HTTP transport.
    /// Without it the client stays disabled and every capture is dropped.
    ///
    /// **Returns**
    /// - `Err(SinkError::MissingDsn)` / `Err(SinkError::InvalidDsn)` if
    ///   the configured DSN is unusable.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let options = ClientOptions {
            dsn: Some(config.parsed_dsn()?),
            release: config.release.clone().map(Into::into),
            environment: Some(config.environment().into()),
            debug: config.debug,
            max_breadcrumbs: config.max_breadcrumbs,
            ..ClientOptions::default()
        };
        #[cfg(feature = "transport")]
        let options = sentry::apply_defaults(options);
        Ok(Self::from_options(options))
    }

    /// Build a client from raw Sentry options, e.g. with a custom transport.
    ///
    /// The options are used as given: without a transport the client is
    /// disabled.
    pub fn from_options(options: ClientOptions) -> Self {
        let client = Arc::new(sentry::Client::from(options));
        SentryClient {
            hub: Hub::new(Some(client), Arc::new(Scope::default())),
            logger: ROOT_LOGGER.to_string(),
        }
    }

    /// Whether captured reports can leave the process.
    pub fn is_enabled(&self) -> bool {
        self.hub.client().map_or(false, |client| client.is_enabled())
    }

    fn to_event(&self, report: ErrorReport) -> Event<'static> {
        let exception = report
            .exception
            .as_ref()
            .map(|err| exception_values(err, report.module_path.as_deref()))
            .unwrap_or_default();

        let culprit = match (&report.module_path, &report.location) {
            (Some(module), Some(location)) => Some(format!("{} in {}", module, location)),
            (Some(module), None) => Some(module.clone()),
            (None, location) => location.clone(),
        };

        Event {
            level: report.level.into(),
            logger: Some(self.logger.clone()),
            message: report.message,
            exception: exception.into(),
            extra: report.extra.into_iter().collect(),
            timestamp: report.timestamp.into(),
            culprit,
            ..Default::default()
        }
    }
}

impl ReportClient for SentryClient {
    fn set_tag(&mut self, key: &str, value: &str) {
        self.hub.configure_scope(|scope| scope.set_tag(key, value));
    }

    fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        self.hub.add_breadcrumb(sentry::Breadcrumb {
            timestamp: breadcrumb.timestamp.into(),
            ty: breadcrumb.category,
            category: Some(breadcrumb.source),
            level: breadcrumb.level.into(),
            message: Some(breadcrumb.message),
            ..Default::default()
        });
    }

    fn set_logger(&mut self, logger: &str) {
        self.logger = logger.to_string();
    }

    fn capture(&mut self, report: ErrorReport) -> Result<ReportId, SinkError> {
        let event = self.to_event(report);
        let id = self.hub.capture_event(event);
        if id.is_nil() {
            return Err(SinkError::Dropped);
        }
        Ok(ReportId::from(id))
    }

    fn flush(&mut self, timeout: Duration) -> bool {
        self.hub
            .client()
            .map_or(true, |client| client.flush(Some(timeout)))
    }
}

/// Sentry expects the exception list oldest first: aggregate members,
/// then the cause chain from the root cause up to `err` itself.
fn exception_values(err: &CapturedError, module: Option<&str>) -> Vec<Exception> {
    let mut values = Vec::new();
    push_exceptions(err, module, &mut values);
    values
}

fn push_exceptions(err: &CapturedError, module: Option<&str>, out: &mut Vec<Exception>) {
    for inner in err.inner() {
        push_exceptions(inner, module, out);
    }

    let mut chain = vec![err];
    let mut current = err;
    while let Some(cause) = current.cause() {
        chain.push(cause);
        current = cause;
    }

    for e in chain.into_iter().rev() {
        out.push(Exception {
            ty: e.ty().to_string(),
            value: Some(e.value().to_string()),
            module: e.module().or(module).map(str::to_string),
            ..Default::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_chain_is_root_first() {
        let err = CapturedError::new("FetchError", "fetch failed")
            .with_cause(CapturedError::new("Timeout", "timed out"));
        let values = exception_values(&err, Some("app::net"));
        let types: Vec<_> = values.iter().map(|e| e.ty.as_str()).collect();
        assert_eq!(types, vec!["Timeout", "FetchError"]);
        assert_eq!(values[0].module.as_deref(), Some("app::net"));
    }

    #[test]
    fn aggregate_members_precede_aggregate() {
        let err = CapturedError::aggregate(vec![
            CapturedError::new("A", "a"),
            CapturedError::new("B", "b").with_module("jobs"),
        ]);
        let values = exception_values(&err, None);
        let types: Vec<_> = values.iter().map(|e| e.ty.as_str()).collect();
        assert_eq!(types, vec!["A", "B", "AggregateError"]);
        assert_eq!(values[1].module.as_deref(), Some("jobs"));
    }
}
