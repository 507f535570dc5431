use crate::error::{Result, ScraperError};
use crate::types::CrashRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Result of a single idempotent upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    DuplicateSkipped,
}

/// Per-item result within a batch
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Inserted,
    DuplicateSkipped,
    Failed(String),
}

/// Aggregate result of a batch upsert. `outcomes` is index-aligned with the
/// input records.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<ItemOutcome>,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchOutcome {
    /// The subset of `records` that was newly inserted, in input order.
    /// This is what the export writer mirrors.
    pub fn inserted_records<'a>(&self, records: &'a [CrashRecord]) -> Vec<&'a CrashRecord> {
        self.outcomes
            .iter()
            .zip(records)
            .filter(|(outcome, _)| matches!(outcome, ItemOutcome::Inserted))
            .map(|(_, record)| record)
            .collect()
    }

    /// Messages of the per-item failures, for the run summary
    pub fn failure_messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                ItemOutcome::Failed(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Storage trait for the deduplicated crash store
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert the record unless a row with the same natural key exists.
    /// Row-level problems surface as `ScraperError::Persistence`; an
    /// unreachable store surfaces as `ScraperError::Connection`.
    async fn upsert_crash(&self, record: &CrashRecord) -> Result<UpsertOutcome>;

    async fn get_by_key(&self, key: &str) -> Result<Option<CrashRecord>>;

    async fn count_crashes(&self) -> Result<usize>;

    /// Upsert each record independently. A row-level failure is recorded and
    /// the batch continues; a connection failure aborts the remainder.
    async fn upsert_batch(&self, records: &[CrashRecord]) -> Result<BatchOutcome> {
        let mut batch = BatchOutcome::default();
        for record in records {
            match self.upsert_crash(record).await {
                Ok(UpsertOutcome::Inserted) => {
                    batch.inserted += 1;
                    batch.outcomes.push(ItemOutcome::Inserted);
                }
                Ok(UpsertOutcome::DuplicateSkipped) => {
                    batch.skipped += 1;
                    batch.outcomes.push(ItemOutcome::DuplicateSkipped);
                }
                Err(ScraperError::Persistence(msg)) => {
                    warn!("Row-level persistence failure, continuing batch: {}", msg);
                    batch.failed += 1;
                    batch.outcomes.push(ItemOutcome::Failed(msg));
                }
                Err(other) => return Err(other),
            }
        }
        Ok(batch)
    }
}

/// In-memory storage implementation for development and testing, keyed by the
/// natural dedup key.
pub struct InMemoryStorage {
    crashes: Arc<Mutex<HashMap<String, CrashRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            crashes: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_crash(&self, record: &CrashRecord) -> Result<UpsertOutcome> {
        let key = record.dedup_key();
        let mut crashes = self.crashes.lock().unwrap();
        if crashes.contains_key(&key) {
            debug!("Duplicate crash record skipped: {}", key);
            return Ok(UpsertOutcome::DuplicateSkipped);
        }
        crashes.insert(key.clone(), record.clone());
        debug!("Inserted crash record: {}", key);
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CrashRecord>> {
        let crashes = self.crashes.lock().unwrap();
        Ok(crashes.get(key).cloned())
    }

    async fn count_crashes(&self) -> Result<usize> {
        let crashes = self.crashes.lock().unwrap();
        Ok(crashes.len())
    }
}
