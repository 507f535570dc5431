use crate::export::CsvExporter;
use crate::staging;
use crate::storage::Storage;
use crate::types::{CrashSource, Source};
use metrics::{counter, histogram};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Per-source pipeline states. `Failed` is terminal and reachable from
/// Fetching (network), Parsing (whole-payload) and Persisting (connection).
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    Idle,
    Fetching,
    Parsing,
    Persisting,
    Exporting,
    Done,
    Failed(String),
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceState::Idle => write!(f, "Idle"),
            SourceState::Fetching => write!(f, "Fetching"),
            SourceState::Parsing => write!(f, "Parsing"),
            SourceState::Persisting => write!(f, "Persisting"),
            SourceState::Exporting => write!(f, "Exporting"),
            SourceState::Done => write!(f, "Done"),
            SourceState::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// Result of one source's pipeline run
#[derive(Debug)]
pub struct SourceReport {
    pub source: Source,
    pub state: SourceState,
    /// Items seen in the payload, valid or not
    pub fetched: usize,
    /// Canonical records produced by the normalizer
    pub normalized: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Per-item parse failures plus per-row persistence failures
    pub failed: usize,
    pub errors: Vec<String>,
    pub export_file: Option<PathBuf>,
}

impl SourceReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            state: SourceState::Idle,
            fetched: 0,
            normalized: 0,
            inserted: 0,
            duplicates: 0,
            failed: 0,
            errors: Vec::new(),
            export_file: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == SourceState::Done
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, SourceState::Failed(_))
    }
}

/// Aggregate of all per-source reports; always produced, even when every
/// source failed.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
}

impl RunSummary {
    pub fn done_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failed()).count()
    }
}

pub struct Pipeline {
    storage: Arc<dyn Storage>,
    exporter: CsvExporter,
    raw_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        raw_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            exporter: CsvExporter::new(processed_dir),
            raw_dir: raw_dir.into(),
        }
    }

    /// Run every source to completion or failure. Sources run concurrently
    /// and in isolation: one source failing never cancels another's work.
    pub async fn run(&self, sources: Vec<Arc<dyn CrashSource>>) -> RunSummary {
        let mut handles = Vec::new();
        for adapter in sources {
            let storage = Arc::clone(&self.storage);
            let exporter = self.exporter.clone();
            let raw_dir = self.raw_dir.clone();
            handles.push(tokio::spawn(async move {
                Self::run_source(adapter, storage, exporter, raw_dir).await
            }));
        }

        let mut summary = RunSummary::default();
        for handle in handles {
            match handle.await {
                Ok(report) => summary.reports.push(report),
                Err(e) => error!("Source pipeline task aborted: {}", e),
            }
        }
        summary
    }

    #[instrument(skip(adapter, storage, exporter, raw_dir), fields(source = %adapter.source()))]
    async fn run_source(
        adapter: Arc<dyn CrashSource>,
        storage: Arc<dyn Storage>,
        exporter: CsvExporter,
        raw_dir: PathBuf,
    ) -> SourceReport {
        let source = adapter.source();
        let mut report = SourceReport::new(source);

        info!("🚀 Starting ingestion for {}", source);
        println!("🚀 Starting ingestion for {}", source);
        counter!("crashdb_pipeline_runs_total", "source" => source.name()).increment(1);
        let t_run = Instant::now();

        // Step 1: fetch the raw payload
        report.state = SourceState::Fetching;
        info!("📡 Fetching raw data from {}...", source);
        let t_fetch = Instant::now();
        let payload = match adapter.fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Fetch failed for {}: {}", source, e);
                counter!("crashdb_source_failures_total", "source" => source.name()).increment(1);
                report.errors.push(format!("fetch: {e}"));
                report.state = SourceState::Failed(format!("fetch: {e}"));
                return report;
            }
        };
        histogram!("crashdb_fetch_duration_seconds", "source" => source.name())
            .record(t_fetch.elapsed().as_secs_f64());

        // Snapshot the payload so a parse can be re-run without re-fetching.
        // A staging failure is logged but never fails the source.
        if let Err(e) = staging::stage_raw_payload(&raw_dir, source, &payload) {
            warn!("Failed to stage raw {} payload: {}", source, e);
            report.errors.push(format!("staging: {e}"));
        }

        // Step 2: parse into canonical records
        report.state = SourceState::Parsing;
        let batch = match adapter.parse(&payload) {
            Ok(batch) => batch,
            Err(e) => {
                error!("Parse failed for {}: {}", source, e);
                counter!("crashdb_source_failures_total", "source" => source.name()).increment(1);
                report.errors.push(format!("parse: {e}"));
                report.state = SourceState::Failed(format!("parse: {e}"));
                return report;
            }
        };
        report.fetched = batch.items_seen();
        report.normalized = batch.records.len();
        report.failed += batch.item_errors.len();
        report.errors.extend(batch.item_errors.iter().cloned());
        info!(
            "✅ Normalized {} records from {} items ({} malformed)",
            report.normalized,
            report.fetched,
            batch.item_errors.len()
        );
        println!(
            "✅ Normalized {} records from {} items",
            report.normalized, report.fetched
        );

        // Step 3: deduplicated persistence
        report.state = SourceState::Persisting;
        let outcome = match storage.upsert_batch(&batch.records).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Persistence failed for {}: {}", source, e);
                counter!("crashdb_source_failures_total", "source" => source.name()).increment(1);
                report.errors.push(format!("persistence: {e}"));
                report.state = SourceState::Failed(format!("persistence: {e}"));
                return report;
            }
        };
        report.inserted = outcome.inserted;
        report.duplicates = outcome.skipped;
        report.failed += outcome.failed;
        report.errors.extend(outcome.failure_messages());
        counter!("crashdb_records_inserted_total", "source" => source.name())
            .increment(outcome.inserted as u64);
        counter!("crashdb_records_skipped_total", "source" => source.name())
            .increment(outcome.skipped as u64);
        counter!("crashdb_record_errors_total", "source" => source.name())
            .increment(report.failed as u64);
        info!(
            "💾 Persisted {} new records ({} duplicates skipped, {} failed)",
            report.inserted, report.duplicates, outcome.failed
        );
        println!(
            "💾 Persisted {} new records ({} duplicates skipped)",
            report.inserted, report.duplicates
        );

        // Step 4: mirror the accepted records to the per-source export file.
        // An export write failure is logged and does not abort persistence or
        // the other sources.
        report.state = SourceState::Exporting;
        let accepted = outcome.inserted_records(&batch.records);
        match exporter.export(source, &accepted) {
            Ok(path) => {
                println!("📄 Exported {} records to {}", accepted.len(), path.display());
                report.export_file = Some(path);
            }
            Err(e) => {
                warn!("Export failed for {}: {}", source, e);
                report.errors.push(format!("export: {e}"));
            }
        }

        report.state = SourceState::Done;
        histogram!("crashdb_pipeline_duration_seconds", "source" => source.name())
            .record(t_run.elapsed().as_secs_f64());
        info!("✅ Ingestion finished for {}", source);
        report
    }
}
