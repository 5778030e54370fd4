//! Process-wide tags shared by every sink instance.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::ReportClient;

static TAGS: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());

/// Insert or overwrite a tag. Every sink includes it from its next write on.
pub fn add_tag(key: impl Into<String>, value: impl Into<String>) {
    lock().insert(key.into(), value.into());
}

/// Copy of the current tag set.
pub fn snapshot() -> BTreeMap<String, String> {
    lock().clone()
}

/// Copy every tag into `client` while holding the tag lock.
pub(crate) fn apply_to(client: &mut dyn ReportClient) {
    for (key, value) in lock().iter() {
        client.set_tag(key, value);
    }
}

fn lock() -> MutexGuard<'static, BTreeMap<String, String>> {
    TAGS.lock().unwrap_or_else(PoisonError::into_inner)
}
