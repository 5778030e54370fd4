use chrono::{DateTime, Utc};
use sentry::types::Uuid;
use std::fmt;
use std::time::Duration;

use crate::error::SinkError;
use crate::level::BreadcrumbLevel;
use crate::report::ErrorReport;

/// Category given to every breadcrumb recorded by the sink.
pub const NAVIGATION_CATEGORY: &str = "navigation";

/// Logger context restored on the client after each send.
pub const ROOT_LOGGER: &str = "root";

/// Synchronous connection to an error-reporting backend.
///
/// The sink serializes all calls through a mutex, so implementations only
/// need to be `Send`. Transport, batching and retries are the
/// implementation's business; the sink makes one `capture` call per
/// reportable event and never retries.
pub trait ReportClient: Send {
    /// Set or overwrite a tag attached to every subsequent report.
    fn set_tag(&mut self, key: &str, value: &str);

    /// Append a breadcrumb to the rolling trail sent with later reports.
    fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb);

    /// Set the logger name attached to subsequent reports.
    fn set_logger(&mut self, logger: &str);

    /// Send a single error report.
    ///
    /// **Returns**
    /// - `Ok(id)` with the identifier assigned by the backend.
    /// - `Err(..)` if the report was rejected or could not be queued.
    fn capture(&mut self, report: ErrorReport) -> Result<ReportId, SinkError>;

    /// Wait up to `timeout` for queued reports to be delivered.
    ///
    /// Returns `true` when everything was flushed. Default implementation
    /// has nothing to flush.
    fn flush(&mut self, _timeout: Duration) -> bool {
        true
    }
}

/// A single entry of the breadcrumb trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Breadcrumb {
    /// Logger the event came from.
    pub source: String,
    pub category: String,
    pub level: BreadcrumbLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Breadcrumb {
    pub fn navigation(
        source: impl Into<String>,
        level: BreadcrumbLevel,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Breadcrumb {
            source: source.into(),
            category: NAVIGATION_CATEGORY.to_string(),
            level,
            message: message.into(),
            timestamp,
        }
    }
}

/// Identifier the backend assigned to an accepted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportId(Uuid);

impl ReportId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for ReportId {
    fn from(uuid: Uuid) -> Self {
        ReportId(uuid)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
