use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::exception::CapturedError;
use crate::level::Severity;

/// One log event handed to the sink by the logging framework.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Name of the logger (the `tracing` target).
    pub logger: String,
    pub message: Option<String>,
    pub exception: Option<CapturedError>,
    pub properties: BTreeMap<String, Value>,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl LogEvent {
    pub fn new(severity: Severity, logger: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            severity,
            logger: logger.into(),
            message: None,
            exception: None,
            properties: BTreeMap::new(),
            module_path: None,
            file: None,
            line: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exception(mut self, exception: CapturedError) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// `file:line` of the call site, when known.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}
