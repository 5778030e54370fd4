use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::exception::CapturedError;
use crate::level::ReportLevel;
use crate::record::LogEvent;

/// Extras key holding the process command line.
pub const ARGS_KEY: &str = "args";

/// Error report built from an error or fatal [`LogEvent`].
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub level: ReportLevel,
    pub message: Option<String>,
    /// Already flattened when the event carried an aggregate.
    pub exception: Option<CapturedError>,
    pub extra: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub module_path: Option<String>,
    pub location: Option<String>,
}

impl ErrorReport {
    /// Build the report for `event`, attaching `args` as the command line.
    ///
    /// Extras are filled in order: event properties, `args`, then the
    /// exception's data collection. Later entries win on key collision.
    pub fn from_event(event: &LogEvent, args: &str) -> Self {
        let mut extra: BTreeMap<String, Value> = event
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), stringify(value)))
            .collect();
        extra.insert(ARGS_KEY.to_string(), Value::String(args.to_string()));

        let exception = event.exception.as_ref().map(CapturedError::flatten);

        if let Some(exception) = &exception {
            for (key, value) in exception.data() {
                extra.insert(key, stringify(&value));
            }
        }

        let message = event
            .message
            .as_ref()
            .filter(|message| !message.trim().is_empty())
            .cloned();

        ErrorReport {
            level: event.severity.report_level(),
            message,
            exception,
            extra,
            timestamp: event.timestamp,
            module_path: event.module_path.clone(),
            location: event.location(),
        }
    }
}

/// String form of a value; strings keep their raw text and null stays null.
fn stringify(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}
