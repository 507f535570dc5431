use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use crashdb_scraper::error::{Result as ScraperResult, ScraperError};
use crashdb_scraper::storage::{BatchOutcome, ItemOutcome, Storage, UpsertOutcome};
use crashdb_scraper::types::{CrashRecord, Source};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Storage fake that fails specific rows, to exercise the batch contract
struct FlakyStorage {
    /// Indexes (by call order) that fail with a row-level error
    poisoned: Vec<usize>,
    /// Index (by call order) that fails with a connection error, if any
    unreachable_from: Option<usize>,
    calls: AtomicUsize,
}

impl FlakyStorage {
    fn new(poisoned: Vec<usize>, unreachable_from: Option<usize>) -> Self {
        Self {
            poisoned,
            unreachable_from,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn upsert_crash(&self, _record: &CrashRecord) -> ScraperResult<UpsertOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable_from == Some(call) {
            return Err(ScraperError::Connection("store went away".to_string()));
        }
        if self.poisoned.contains(&call) {
            return Err(ScraperError::Persistence(format!(
                "constraint violation on row {call}"
            )));
        }
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_by_key(&self, _key: &str) -> ScraperResult<Option<CrashRecord>> {
        Ok(None)
    }

    async fn count_crashes(&self) -> ScraperResult<usize> {
        Ok(0)
    }
}

fn records(count: usize) -> Vec<CrashRecord> {
    (0..count)
        .map(|i| CrashRecord {
            event_date: NaiveDate::from_ymd_opt(2023, 7, 1),
            location: format!("Location {i}"),
            operator: "Batch Air".to_string(),
            aircraft_type: None,
            registration: None,
            flight_number: Some(format!("BA{i}")),
            route: String::new(),
            fatalities: 0,
            description: None,
            source_url: format!("https://example.test/{i}"),
            source: Source::Ntsb,
        })
        .collect()
}

#[tokio::test]
async fn row_level_failures_do_not_abort_the_batch() -> Result<()> {
    let storage = FlakyStorage::new(vec![1, 3], None);
    let records = records(5);

    let batch: BatchOutcome = storage.upsert_batch(&records).await?;
    assert_eq!(batch.inserted, 3);
    assert_eq!(batch.failed, 2);
    assert_eq!(batch.outcomes.len(), 5);
    assert!(matches!(batch.outcomes[1], ItemOutcome::Failed(_)));
    assert!(matches!(batch.outcomes[3], ItemOutcome::Failed(_)));

    // The export set excludes failed rows
    assert_eq!(batch.inserted_records(&records).len(), 3);
    Ok(())
}

#[tokio::test]
async fn a_connection_failure_aborts_the_remaining_batch() {
    let storage = FlakyStorage::new(vec![], Some(2));
    let records = records(5);

    let err = storage.upsert_batch(&records).await.unwrap_err();
    assert!(matches!(err, ScraperError::Connection(_)));
    // Only the rows before the outage were attempted
    assert_eq!(storage.calls.load(Ordering::SeqCst), 3);
}
