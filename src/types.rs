use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw body text as fetched from an external source, staged verbatim before parsing
pub type RawPayload = String;

/// Provenance of a crash record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Ntsb,
    Asn,
}

impl Source {
    /// Short name used in the CLI and export filenames
    pub fn name(&self) -> &'static str {
        match self {
            Source::Ntsb => crate::constants::NTSB_SOURCE,
            Source::Asn => crate::constants::ASN_SOURCE,
        }
    }

    /// Label stored in the `source` column
    pub fn label(&self) -> &'static str {
        match self {
            Source::Ntsb => "NTSB",
            Source::Asn => "ASN",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "NTSB" => Some(Source::Ntsb),
            "ASN" => Some(Source::Asn),
            _ => None,
        }
    }

    /// Filename of the per-run raw payload snapshot
    pub fn raw_filename(&self) -> &'static str {
        match self {
            Source::Ntsb => "ntsb_data.json",
            Source::Asn => "asn_data.html",
        }
    }

    /// Filename of the per-source CSV export
    pub fn export_filename(&self) -> String {
        format!("{}_crashes.csv", self.name())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical crash record all sources converge to. Immutable once constructed:
/// a record is persisted, skipped as a duplicate, or rejected, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Calendar date of the event; None when the source text was unparseable
    pub event_date: Option<NaiveDate>,
    pub location: String,
    pub operator: String,
    pub aircraft_type: Option<String>,
    pub registration: Option<String>,
    pub flight_number: Option<String>,
    /// "<origin> to <destination>", empty if either leg is unknown
    pub route: String,
    pub fatalities: u32,
    pub description: Option<String>,
    pub source_url: String,
    pub source: Source,
}

impl CrashRecord {
    /// Natural identity used for deduplication: (event_date, flight_number,
    /// location), falling back to the operator when no flight number is known.
    /// Lowercased and joined so the same string works as the in-memory map key
    /// and as the unique column in the relational store.
    pub fn dedup_key(&self) -> String {
        let date = self
            .event_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let discriminant = match self.flight_number.as_deref() {
            Some(flight) if !flight.is_empty() => flight,
            _ => self.operator.as_str(),
        };
        format!(
            "{}|{}|{}",
            date,
            discriminant.to_lowercase(),
            self.location.to_lowercase()
        )
    }
}

/// Outcome of parsing one raw payload. Per-item failures never abort the
/// batch; they are carried here for the run summary.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<CrashRecord>,
    pub item_errors: Vec<String>,
}

impl ParsedBatch {
    /// Total items encountered in the payload, valid or not
    pub fn items_seen(&self) -> usize {
        self.records.len() + self.item_errors.len()
    }
}

/// Core trait that all crash data sources must implement
#[async_trait::async_trait]
pub trait CrashSource: Send + Sync {
    /// Which source this adapter feeds
    fn source(&self) -> Source;

    /// Fetch the raw payload from the external source
    async fn fetch(&self) -> Result<RawPayload>;

    /// Parse a previously fetched payload into canonical records.
    /// Err means the whole payload is malformed; individual bad items are
    /// reported through `ParsedBatch::item_errors`.
    fn parse(&self, payload: &RawPayload) -> Result<ParsedBatch>;
}
