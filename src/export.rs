use crate::error::Result;
use crate::types::{CrashRecord, Source};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Canonical field order of the export files
pub const CSV_FIELDS: [&str; 10] = [
    "event_date",
    "location",
    "operator",
    "aircraft_type",
    "registration",
    "flight_number",
    "route",
    "fatalities",
    "description",
    "source_url",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row, double-quote escaping where needed
fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// One record in the canonical field order; optional fields render empty
fn record_row(record: &CrashRecord) -> Vec<String> {
    vec![
        record
            .event_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        record.location.clone(),
        record.operator.clone(),
        record.aircraft_type.clone().unwrap_or_default(),
        record.registration.clone().unwrap_or_default(),
        record.flight_number.clone().unwrap_or_default(),
        record.route.clone(),
        record.fatalities.to_string(),
        record.description.clone().unwrap_or_default(),
        record.source_url.clone(),
    ]
}

/// Mirrors accepted records to one CSV file per source per run
#[derive(Debug, Clone)]
pub struct CsvExporter {
    processed_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
        }
    }

    pub fn output_path(&self, source: Source) -> PathBuf {
        self.processed_dir.join(source.export_filename())
    }

    /// Write the records accepted into the store this run, header first.
    /// The previous run's file is replaced.
    pub fn export(&self, source: Source, records: &[&CrashRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.processed_dir)?;
        let path = self.output_path(source);

        let file = fs::File::create(&path)?;
        let mut writer = BufWriter::new(file);
        write_row(&mut writer, &CSV_FIELDS)?;
        for record in records {
            write_row(&mut writer, &record_row(record))?;
        }
        writer.flush()?;

        info!(
            "Exported {} {} records to {}",
            records.len(),
            source,
            path.display()
        );
        Ok(path)
    }

    /// Parse an export file back into rows, used by tests and downstream
    /// consumers that re-read the processed data.
    pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
        let text = fs::read_to_string(path)?;
        Ok(parse_rows(&text))
    }
}

/// Minimal CSV parser (quotes + CRLF tolerant)
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next(); // double-quote escape
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                row.push(std::mem::take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                if !row.is_empty() && !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn record(description: Option<&str>) -> CrashRecord {
        CrashRecord {
            event_date: NaiveDate::from_ymd_opt(2023, 2, 2),
            location: "Everett, Washington, United States".to_string(),
            operator: "Cargo, Inc.".to_string(),
            aircraft_type: Some("Boeing 747".to_string()),
            registration: Some("N1234".to_string()),
            flight_number: None,
            route: "SEA to ANC".to_string(),
            fatalities: 2,
            description: description.map(|d| d.to_string()),
            source_url: "https://example.test/2".to_string(),
            source: Source::Ntsb,
        }
    }

    #[test]
    fn header_matches_canonical_field_order() {
        let dir = tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let path = exporter.export(Source::Ntsb, &[]).unwrap();

        let rows = CsvExporter::read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], CSV_FIELDS.to_vec());
    }

    #[test]
    fn fields_with_commas_and_quotes_survive_round_trip() {
        let dir = tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let r = record(Some("pilot reported \"smoke\", diverted"));
        let path = exporter.export(Source::Ntsb, &[&r]).unwrap();

        let rows = CsvExporter::read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "Everett, Washington, United States");
        assert_eq!(rows[1][2], "Cargo, Inc.");
        assert_eq!(rows[1][8], "pilot reported \"smoke\", diverted");
    }

    #[test]
    fn optional_fields_render_empty() {
        let dir = tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let path = exporter.export(Source::Ntsb, &[&record(None)]).unwrap();

        let rows = CsvExporter::read_rows(&path).unwrap();
        assert_eq!(rows[1][5], ""); // flight_number
        assert_eq!(rows[1][8], ""); // description
        assert_eq!(rows[1][7], "2"); // fatalities
    }

    #[test]
    fn export_replaces_the_previous_run() {
        let dir = tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let r = record(None);
        exporter.export(Source::Asn, &[&r, &r]).unwrap();
        let path = exporter.export(Source::Asn, &[]).unwrap();

        let rows = CsvExporter::read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1, "only the header should remain");
    }
}
