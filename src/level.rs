use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`LogEvent`](crate::record::LogEvent) as seen by the sink.
///
/// Ordered from most to least verbose, so `severity >= Severity::Error`
/// selects the events that escalate into reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Level attached to an error report sent to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

/// Coarser level used for breadcrumbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Every severity, least severe first.
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Level used when this severity is escalated into an error report.
    pub fn report_level(self) -> ReportLevel {
        match self {
            Severity::Trace | Severity::Debug => ReportLevel::Debug,
            Severity::Info => ReportLevel::Info,
            Severity::Warn => ReportLevel::Warning,
            Severity::Error => ReportLevel::Error,
            Severity::Fatal => ReportLevel::Fatal,
        }
    }

    /// Level used for the breadcrumb recorded for this severity.
    pub fn breadcrumb_level(self) -> BreadcrumbLevel {
        match self {
            Severity::Trace | Severity::Debug => BreadcrumbLevel::Debug,
            Severity::Info => BreadcrumbLevel::Info,
            Severity::Warn => BreadcrumbLevel::Warning,
            Severity::Error => BreadcrumbLevel::Error,
            _ => BreadcrumbLevel::Critical,
        }
    }

    /// Whether events of this severity are sent as error reports.
    pub fn is_reportable(self) -> bool {
        self >= Severity::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReportLevel> for sentry::Level {
    fn from(level: ReportLevel) -> Self {
        match level {
            ReportLevel::Debug => sentry::Level::Debug,
            ReportLevel::Info => sentry::Level::Info,
            ReportLevel::Warning => sentry::Level::Warning,
            ReportLevel::Error => sentry::Level::Error,
            ReportLevel::Fatal => sentry::Level::Fatal,
        }
    }
}

// Sentry has no "critical" breadcrumb level; fatal is the closest match.
impl From<BreadcrumbLevel> for sentry::Level {
    fn from(level: BreadcrumbLevel) -> Self {
        match level {
            BreadcrumbLevel::Debug => sentry::Level::Debug,
            BreadcrumbLevel::Info => sentry::Level::Info,
            BreadcrumbLevel::Warning => sentry::Level::Warning,
            BreadcrumbLevel::Error => sentry::Level::Error,
            BreadcrumbLevel::Critical => sentry::Level::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_mapping_is_total() {
        let mapped: Vec<_> = Severity::ALL.iter().map(|s| s.report_level()).collect();
        assert_eq!(
            mapped,
            vec![
                ReportLevel::Debug,
                ReportLevel::Debug,
                ReportLevel::Info,
                ReportLevel::Warning,
                ReportLevel::Error,
                ReportLevel::Fatal,
            ]
        );
    }

    #[test]
    fn breadcrumb_mapping_escalates_fatal_to_critical() {
        assert_eq!(Severity::Trace.breadcrumb_level(), BreadcrumbLevel::Debug);
        assert_eq!(Severity::Warn.breadcrumb_level(), BreadcrumbLevel::Warning);
        assert_eq!(Severity::Error.breadcrumb_level(), BreadcrumbLevel::Error);
        assert_eq!(Severity::Fatal.breadcrumb_level(), BreadcrumbLevel::Critical);
    }

    #[test]
    fn only_error_and_fatal_are_reportable() {
        let reportable: Vec<_> = Severity::ALL.iter().copied().filter(|s| s.is_reportable()).collect();
        assert_eq!(reportable, vec![Severity::Error, Severity::Fatal]);
    }

    #[test]
    fn tracing_levels_convert() {
        assert_eq!(Severity::from(&tracing::Level::TRACE), Severity::Trace);
        assert_eq!(Severity::from(&tracing::Level::WARN), Severity::Warn);
        assert_eq!(Severity::from(&tracing::Level::ERROR), Severity::Error);
    }

    #[test]
    fn severity_deserializes_lowercase() {
        let level: Severity = serde_json::from_str("\"fatal\"").unwrap();
        assert_eq!(level, Severity::Fatal);
    }
}
