use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sentry::types::Uuid;

use crate::client::{Breadcrumb, ReportClient, ReportId, ROOT_LOGGER};
use crate::config::DEFAULT_MAX_BREADCRUMBS;
use crate::error::SinkError;
use crate::report::ErrorReport;

/// Number of reports a [`MemoryClient`] keeps unless configured otherwise.
pub const DEFAULT_MAX_REPORTS: usize = 1_000;

/// A client that keeps everything in memory.
///
/// Useful for measuring the overhead of the sink itself without any
/// network I/O, and for tests that want to inspect what would have been
/// sent. Clones share the same state. Only the most recent reports are
/// kept; [`report_count`](Self::report_count) counts every accepted one.
#[derive(Clone, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
    next_id: Arc<AtomicU64>,
}

/// Everything a [`MemoryClient`] has recorded so far.
#[derive(Debug, Clone)]
pub struct MemoryState {
    pub tags: BTreeMap<String, String>,
    pub breadcrumbs: VecDeque<Breadcrumb>,
    pub reports: VecDeque<CapturedReport>,
    pub report_capacity: usize,
    /// Reports accepted since creation, including evicted ones.
    pub total_reports: u64,
    /// Logger context currently set on the client.
    pub logger: String,
    pub failure: Option<String>,
}

impl Default for MemoryState {
    fn default() -> Self {
        MemoryState {
            tags: BTreeMap::new(),
            breadcrumbs: VecDeque::new(),
            reports: VecDeque::new(),
            report_capacity: DEFAULT_MAX_REPORTS,
            total_reports: 0,
            logger: ROOT_LOGGER.to_string(),
            failure: None,
        }
    }
}

/// A report accepted by a [`MemoryClient`].
#[derive(Debug, Clone)]
pub struct CapturedReport {
    pub id: ReportId,
    /// Logger context active when the report was sent.
    pub logger: String,
    pub tags: BTreeMap<String, String>,
    pub report: ErrorReport,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` reports (at least one).
    pub fn with_report_capacity(self, capacity: usize) -> Self {
        {
            let mut state = self.lock();
            state.report_capacity = capacity.max(1);
            while state.reports.len() > state.report_capacity {
                state.reports.pop_front();
            }
        }
        self
    }

    /// Make every following `capture` fail with `reason`.
    pub fn fail_sends(&self, reason: impl Into<String>) {
        self.lock().failure = Some(reason.into());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    pub fn snapshot(&self) -> MemoryState {
        self.lock().clone()
    }

    /// The retained reports, oldest first.
    pub fn reports(&self) -> Vec<CapturedReport> {
        self.lock().reports.iter().cloned().collect()
    }

    pub fn report_count(&self) -> u64 {
        self.lock().total_reports
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.lock().breadcrumbs.iter().cloned().collect()
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.lock().tags.clone()
    }

    pub fn logger(&self) -> String {
        self.lock().logger.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReportClient for MemoryClient {
    fn set_tag(&mut self, key: &str, value: &str) {
        self.lock().tags.insert(key.to_string(), value.to_string());
    }

    fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        let mut state = self.lock();
        if state.breadcrumbs.len() == DEFAULT_MAX_BREADCRUMBS {
            state.breadcrumbs.pop_front();
        }
        state.breadcrumbs.push_back(breadcrumb);
    }

    fn set_logger(&mut self, logger: &str) {
        self.lock().logger = logger.to_string();
    }

    fn capture(&mut self, report: ErrorReport) -> Result<ReportId, SinkError> {
        let mut state = self.lock();
        if let Some(reason) = &state.failure {
            return Err(SinkError::Send(reason.clone()));
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = ReportId::from(Uuid::from_u128(n as u128));
        let captured = CapturedReport {
            id,
            logger: state.logger.clone(),
            tags: state.tags.clone(),
            report,
        };
        if state.reports.len() >= state.report_capacity {
            state.reports.pop_front();
        }
        state.reports.push_back(captured);
        state.total_reports += 1;
        Ok(id)
    }
}
