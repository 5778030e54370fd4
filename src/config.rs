use serde::Deserialize;

use crate::env::{
    env_flag, env_or, SENTRY_SINK_DEBUG_ENV, SENTRY_SINK_DSN_ENV, SENTRY_SINK_PRODUCTION_ENV,
    SENTRY_SINK_RELEASE_ENV,
};
use crate::error::SinkError;

/// Default length of the breadcrumb trail kept by the client.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// Configuration of an [`ErrorReportingSink`](crate::sink::ErrorReportingSink).
///
/// **Fields**
/// - `dsn`: Sentry DSN the reports are sent to. Required.
/// - `release`: release identifier, usually the application version.
/// - `production`: selects the `prod` environment instead of `dev`.
///   Defaults to `true` in release builds.
/// - `debug`: turns on the Sentry client's own debug output.
/// - `max_breadcrumbs`: length of the rolling breadcrumb trail.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub dsn: String,
    pub release: Option<String>,
    pub production: bool,
    pub debug: bool,
    pub max_breadcrumbs: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            release: None,
            production: !cfg!(debug_assertions),
            debug: false,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
        }
    }
}

impl SinkConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Build a config from the `SENTRY_SINK_*` environment variables.
    ///
    /// Unset flags keep their defaults; a missing DSN is reported when the
    /// sink is built.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let release = env_or(SENTRY_SINK_RELEASE_ENV, "");
        Self {
            dsn: env_or(SENTRY_SINK_DSN_ENV, ""),
            release: if release.is_empty() { None } else { Some(release) },
            production: env_flag(SENTRY_SINK_PRODUCTION_ENV).unwrap_or(defaults.production),
            debug: env_flag(SENTRY_SINK_DEBUG_ENV).unwrap_or(defaults.debug),
            max_breadcrumbs: defaults.max_breadcrumbs,
        }
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_breadcrumbs(mut self, max_breadcrumbs: usize) -> Self {
        self.max_breadcrumbs = max_breadcrumbs;
        self
    }

    /// Environment label sent with every report.
    pub fn environment(&self) -> &'static str {
        if self.production {
            "prod"
        } else {
            "dev"
        }
    }

    /// Parse the configured DSN.
    pub fn parsed_dsn(&self) -> Result<sentry::types::Dsn, SinkError> {
        let dsn = self.dsn.trim();
        if dsn.is_empty() {
            return Err(SinkError::MissingDsn(SENTRY_SINK_DSN_ENV));
        }
        Ok(dsn.parse()?)
    }
}
