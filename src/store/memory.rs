use super::{AnomalyStore, StoreResult};
use crate::error::StoreError;
use crate::record::AnomalyRecord;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// In-process store for dry runs and tests.
///
/// Can be switched into a failing mode to exercise the persistence error path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AnomalyRecord>>,
    failing: AtomicBool,
    attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every `persist` fails
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<AnomalyRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `persist` calls, failed ones included
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AnomalyStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn persist(&self, record: AnomalyRecord) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Query("memory store is in failing mode".into()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        records.push(record);
        Ok(())
    }
}
