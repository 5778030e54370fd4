pub mod client;
pub mod config;
pub mod env;
pub mod error;
pub mod exception;
pub mod layer;
pub mod level;
pub mod record;
pub mod report;
pub mod sink;
pub mod tags;

pub mod init;
pub mod memory_client;
pub mod sentry_client;

pub use client::{Breadcrumb, ReportClient, ReportId};
pub use config::SinkConfig;
pub use error::SinkError;
pub use exception::CapturedError;
pub use layer::SentryLayer;
pub use level::Severity;
pub use record::LogEvent;
pub use sink::ErrorReportingSink;
