use crate::model::ProfileId;
use crate::runner::ExecutionResult;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub command: String,
    pub timestamp: String,
    pub profiles: Vec<ProfileId>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub total: usize,
}

impl HistoryEntry {
    /// Tallies completed results. Targets that never completed (a cancelled
    /// request) count toward `total` only.
    pub fn summarize(command: &str, targets: &[ProfileId], results: &[ExecutionResult]) -> Self {
        let skipped_count = results.iter().filter(|result| result.skipped).count();
        let success_count = results.iter().filter(|result| result.success).count();
        Self {
            id: Uuid::new_v4(),
            command: command.to_string(),
            timestamp: now_rfc3339(),
            profiles: targets.to_vec(),
            success_count,
            failure_count: results.len() - success_count - skipped_count,
            skipped_count,
            total: targets.len(),
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Bounded in-memory command history, shared by every session.
#[derive(Debug)]
pub struct HistoryRing {
    capacity: usize,
    inner: Mutex<HistoryState>,
}

#[derive(Debug, Default)]
struct HistoryState {
    entries: VecDeque<HistoryEntry>,
    latest: Vec<ExecutionResult>,
}

impl HistoryState {
    fn push(&mut self, entry: HistoryEntry, capacity: usize) {
        while self.entries.len() >= capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HistoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, entry: HistoryEntry) {
        self.state().push(entry, self.capacity);
    }

    /// Appends the entry and remembers the per-profile results behind it.
    pub fn record(&self, entry: HistoryEntry, results: Vec<ExecutionResult>) {
        let mut state = self.state();
        state.push(entry, self.capacity);
        state.latest = results;
    }

    /// Most recent first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.state().entries.iter().rev().cloned().collect()
    }

    /// Entries (most recent first) and the results behind the newest one,
    /// read together.
    pub fn snapshot(&self) -> (Vec<HistoryEntry>, Vec<ExecutionResult>) {
        let state = self.state();
        (
            state.entries.iter().rev().cloned().collect(),
            state.latest.clone(),
        )
    }

    pub fn latest_results(&self) -> Vec<ExecutionResult> {
        self.state().latest.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.latest.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
