/// Errors produced while configuring the sink or delivering a report.
///
/// None of these ever escape [`ErrorReportingSink::write`](crate::sink::ErrorReportingSink::write);
/// they are handed to the sink's failure handler instead.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("no DSN configured (set {0})")]
    MissingDsn(&'static str),

    #[error("invalid DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),

    #[error("report was dropped by the client")]
    Dropped,

    #[error("client failed to send report: {0}")]
    Send(String),

    #[error("panic while reporting: {0}")]
    Panicked(String),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}
