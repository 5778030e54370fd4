use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::ReportId;

/// Data key set to `true` once an error has been reported.
pub const REPORTED_KEY: &str = "S_REPORTED";

/// Data key holding the remote identifier of the report.
pub const REPORT_ID_KEY: &str = "SENTRY_ID";

const AGGREGATE_MESSAGE: &str = "One or more errors occurred.";

/// An error attached to a log event, together with a mutable data
/// collection shared by all of its clones.
///
/// After a successful report the sink writes [`REPORTED_KEY`] and
/// [`REPORT_ID_KEY`] into the data collection, so any code holding a
/// clone of the same error can tell that it was already reported.
#[derive(Clone)]
pub struct CapturedError {
    ty: String,
    value: String,
    module: Option<String>,
    cause: Option<Box<CapturedError>>,
    inner: Vec<CapturedError>,
    aggregate: bool,
    data: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl CapturedError {
    pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
        CapturedError {
            ty: ty.into(),
            value: value.into(),
            module: None,
            cause: None,
            inner: Vec::new(),
            aggregate: false,
            data: Arc::default(),
        }
    }

    /// Capture any error, walking its `source()` chain into causes.
    ///
    /// The type name is the leading identifier of the error's `Debug`
    /// output, so it survives erasure to `dyn Error`.
    pub fn from_error<E: Error + ?Sized>(err: &E) -> Self {
        let mut captured = CapturedError::new(sentry::parse_type_from_debug(&format!("{err:?}")), err.to_string());
        captured.cause = err.source().map(|source| Box::new(capture_source(source)));
        captured
    }

    /// An aggregate of several independent failures.
    pub fn aggregate(inner: Vec<CapturedError>) -> Self {
        CapturedError {
            inner,
            aggregate: true,
            ..CapturedError::new("AggregateError", AGGREGATE_MESSAGE)
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_cause(mut self, cause: CapturedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_data(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_data(key, value);
        self
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn cause(&self) -> Option<&CapturedError> {
        self.cause.as_deref()
    }

    pub fn inner(&self) -> &[CapturedError] {
        &self.inner
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Collapse nested aggregates so the inner list only holds
    /// non-aggregate errors.
    ///
    /// Non-aggregates are returned as a clone sharing the same data. A
    /// flattened aggregate is a new error whose data collection is a copy
    /// of this one's.
    pub fn flatten(&self) -> CapturedError {
        if !self.aggregate {
            return self.clone();
        }

        let mut leaves = Vec::new();
        collect_leaves(&self.inner, &mut leaves);

        CapturedError {
            ty: self.ty.clone(),
            value: self.value.clone(),
            module: self.module.clone(),
            cause: self.cause.clone(),
            inner: leaves,
            aggregate: true,
            data: Arc::new(Mutex::new(self.data())),
        }
    }

    pub fn insert_data(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock_data().insert(key.into(), value.into());
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.lock_data().get(key).cloned()
    }

    /// Copy of the current data collection.
    pub fn data(&self) -> BTreeMap<String, Value> {
        self.lock_data().clone()
    }

    /// Whether this error (or a clone of it) was already reported.
    pub fn is_reported(&self) -> bool {
        matches!(self.get_data(REPORTED_KEY), Some(Value::Bool(true)))
    }

    /// Remote identifier of the last report for this error.
    pub fn report_id(&self) -> Option<String> {
        match self.get_data(REPORT_ID_KEY) {
            Some(Value::String(id)) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn mark_reported(&self, id: &ReportId) {
        let mut data = self.lock_data();
        data.insert(REPORTED_KEY.to_string(), Value::Bool(true));
        data.insert(REPORT_ID_KEY.to_string(), Value::String(id.to_string()));
    }

    /// Whether both values share one data collection.
    pub fn same_instance(&self, other: &CapturedError) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn capture_source(err: &(dyn Error + 'static)) -> CapturedError {
    if let Some(captured) = err.downcast_ref::<CapturedError>() {
        return captured.clone();
    }
    CapturedError::from_error(err)
}

fn collect_leaves(errors: &[CapturedError], out: &mut Vec<CapturedError>) {
    for err in errors {
        if err.aggregate {
            collect_leaves(&err.inner, out);
        } else {
            out.push(err.clone());
        }
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedError")
            .field("ty", &self.ty)
            .field("value", &self.value)
            .field("module", &self.module)
            .field("cause", &self.cause)
            .field("inner", &self.inner)
            .field("data", &self.data())
            .finish()
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Error for CapturedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn from_error_takes_type_from_debug_output() {
        let err = io::Error::new(io::ErrorKind::Other, "disk full");
        let captured = CapturedError::from_error(&err);
        assert_eq!(captured.ty(), "Custom");
        assert_eq!(captured.value(), "disk full");

        let parse = "x".parse::<u32>().unwrap_err();
        assert_eq!(CapturedError::from_error(&parse).ty(), "ParseIntError");
    }

    #[test]
    fn erased_errors_keep_their_type_name() {
        let parse = "x".parse::<u32>().unwrap_err();
        let erased: &(dyn Error + 'static) = &parse;
        assert_eq!(CapturedError::from_error(erased).ty(), "ParseIntError");

        let boxed: Box<dyn Error + Send + Sync> = Box::new("1.5x".parse::<f64>().unwrap_err());
        assert_eq!(CapturedError::from_error(boxed.as_ref()).ty(), "ParseFloatError");
    }

    #[test]
    fn from_error_follows_source_chain() {
        let root = CapturedError::new("Timeout", "connection timed out");
        let outer = CapturedError::new("FetchError", "fetch failed").with_cause(root);
        let captured = CapturedError::from_error(&outer);
        assert_eq!(captured.cause().map(|c| c.value()), Some("connection timed out"));
    }

    #[test]
    fn clones_share_data() {
        let err = CapturedError::new("IoError", "disk full");
        let clone = err.clone();
        clone.insert_data("path", "/var");
        assert_eq!(err.get_data("path"), Some(Value::from("/var")));
        assert!(err.same_instance(&clone));
    }

    #[test]
    fn flatten_expands_nested_aggregates() {
        let nested = CapturedError::aggregate(vec![
            CapturedError::new("A", "a"),
            CapturedError::new("B", "b"),
        ]);
        let outer = CapturedError::aggregate(vec![nested, CapturedError::new("C", "c")])
            .with_data("job", "sync");

        let flat = outer.flatten();
        let names: Vec<_> = flat.inner().iter().map(|e| e.ty()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(flat.is_aggregate());
        assert!(!flat.same_instance(&outer));
        assert_eq!(flat.get_data("job"), Some(Value::from("sync")));
    }

    #[test]
    fn flatten_of_plain_error_is_same_instance() {
        let err = CapturedError::new("IoError", "disk full");
        assert!(err.flatten().same_instance(&err));
    }

    #[test]
    fn markers_round_trip() {
        let err = CapturedError::new("IoError", "disk full");
        assert!(!err.is_reported());
        let id = ReportId::from(sentry::types::Uuid::from_u128(7));
        err.mark_reported(&id);
        assert!(err.is_reported());
        assert_eq!(err.report_id(), Some(id.to_string()));
    }
}
