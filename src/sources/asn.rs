use crate::config::ScraperConfig;
use crate::constants;
use crate::error::{Result, ScraperError};
use crate::normalize::{clean_text, fatalities_from_text, optional_text, parse_listing_date};
use crate::sources::{get_with_retry, FetchOptions};
use crate::types::{CrashRecord, CrashSource, ParsedBatch, RawPayload, Source};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Minimum cells a listing row must have to be usable; extra cells are ignored
const MIN_LISTING_CELLS: usize = 6;

/// Adapter for the Aviation Safety Network year listing page
pub struct AsnListing {
    client: reqwest::Client,
    year: u16,
    options: FetchOptions,
}

impl AsnListing {
    pub fn new(config: &ScraperConfig, year: Option<u16>) -> Self {
        Self {
            client: reqwest::Client::new(),
            year: year.unwrap_or(config.asn_year),
            options: FetchOptions::from_config(config),
        }
    }

    fn listing_url(&self) -> String {
        format!("{}?Year={}", constants::ASN_LISTING_URL, self.year)
    }

    fn cell_text(cell: &ElementRef) -> String {
        clean_text(&cell.text().collect::<Vec<_>>().join(" "))
    }

    /// Column order: date, registration, location, operator, aircraft type,
    /// fatalities ("killed/aboard").
    fn record_from_row(&self, cells: &[ElementRef], anchor_selector: &Selector) -> CrashRecord {
        let date_text = Self::cell_text(&cells[0]);
        let event_date = parse_listing_date(&date_text);
        if event_date.is_none() {
            debug!("Unparseable listing date '{}', keeping record with no date", date_text);
        }

        let source_url = cells[0]
            .select(anchor_selector)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .map(|href| format!("{}{}", constants::ASN_BASE_URL, href))
            // Rows without a detail link still need provenance
            .unwrap_or_else(|| self.listing_url());

        CrashRecord {
            event_date,
            location: Self::cell_text(&cells[2]),
            operator: Self::cell_text(&cells[3]),
            aircraft_type: optional_text(&Self::cell_text(&cells[4])),
            registration: optional_text(&Self::cell_text(&cells[1])),
            // Not available in the listing table
            flight_number: None,
            route: String::new(),
            fatalities: fatalities_from_text(&Self::cell_text(&cells[5])),
            description: None,
            source_url,
            source: Source::Asn,
        }
    }
}

#[async_trait::async_trait]
impl CrashSource for AsnListing {
    fn source(&self) -> Source {
        Source::Asn
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<RawPayload> {
        debug!("Fetching ASN listing for year {}", self.year);
        let query = [("Year", self.year.to_string())];
        get_with_retry(&self.client, constants::ASN_LISTING_URL, &query, self.options).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParsedBatch> {
        let document = Html::parse_document(payload);
        let table_selector = Selector::parse("table.statistics").unwrap();
        let row_selector = Selector::parse("tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();
        let anchor_selector = Selector::parse("a").unwrap();

        let table = document.select(&table_selector).next().ok_or_else(|| {
            ScraperError::Parse("no statistics table in ASN listing page".to_string())
        })?;

        let mut batch = ParsedBatch::default();
        // First row is the header
        for (index, row) in table.select(&row_selector).skip(1).enumerate() {
            let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
            if cells.len() < MIN_LISTING_CELLS {
                let message = format!(
                    "row {} has {} cells, expected at least {}",
                    index,
                    cells.len(),
                    MIN_LISTING_CELLS
                );
                warn!("Skipping malformed ASN row: {}", message);
                batch.item_errors.push(message);
                continue;
            }
            batch.records.push(self.record_from_row(&cells, &anchor_selector));
        }

        info!(
            "Parsed {} ASN records ({} malformed rows)",
            batch.records.len(),
            batch.item_errors.len()
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn listing() -> AsnListing {
        AsnListing::new(&ScraperConfig::default(), Some(2023))
    }

    fn page(rows: &str) -> String {
        format!(
            "<html><body><table class=\"statistics\">\
             <tr><th>date</th><th>reg</th><th>location</th><th>operator</th>\
             <th>type</th><th>fatalities</th></tr>{rows}</table></body></html>"
        )
    }

    const VALID_ROW: &str = "<tr>\
        <td><a href=\"/database/record.php?id=20230314-0\">14-MAR-2023</a></td>\
        <td>N123AB</td><td>near Moses Lake, WA</td><td>Sample Airways</td>\
        <td>Boeing 737-800</td><td>5/3</td></tr>";

    #[test]
    fn parses_the_fixed_column_order() {
        let batch = listing().parse(&page(VALID_ROW)).unwrap();
        assert_eq!(batch.records.len(), 1);

        let record = &batch.records[0];
        assert_eq!(record.event_date, NaiveDate::from_ymd_opt(2023, 3, 14));
        assert_eq!(record.registration.as_deref(), Some("N123AB"));
        assert_eq!(record.location, "near Moses Lake, WA");
        assert_eq!(record.operator, "Sample Airways");
        assert_eq!(record.aircraft_type.as_deref(), Some("Boeing 737-800"));
        assert_eq!(record.fatalities, 5);
        assert_eq!(
            record.source_url,
            "https://aviation-safety.net/database/record.php?id=20230314-0"
        );
        assert_eq!(record.source, Source::Asn);
    }

    #[test]
    fn short_rows_are_skipped_without_aborting_the_page() {
        let mut rows = String::new();
        for i in 0..10 {
            rows.push_str(&format!(
                "<tr><td>1{i}-MAR-2023</td><td>N{i}</td><td>Somewhere</td>\
                 <td>Operator {i}</td><td>PA-28</td><td>0</td></tr>"
            ));
        }
        rows.push_str("<tr><td>date unk.</td><td>N999</td><td>short row</td></tr>");

        let batch = listing().parse(&page(&rows)).unwrap();
        assert_eq!(batch.records.len(), 10);
        assert_eq!(batch.item_errors.len(), 1);
        assert!(batch.item_errors[0].contains("3 cells"));
    }

    #[test]
    fn unparseable_dates_keep_the_record_with_no_date() {
        let row = "<tr><td>date unk.</td><td></td><td>Atlantic Ocean</td>\
                   <td>Ferry flight</td><td>DC-3</td><td>3/3</td></tr>";
        let batch = listing().parse(&page(row)).unwrap();

        let record = &batch.records[0];
        assert_eq!(record.event_date, None);
        assert_eq!(record.fatalities, 3);
        assert_eq!(record.registration, None);
        // No anchor in the date cell: provenance falls back to the listing URL
        assert!(record.source_url.contains("dblist.php?Year=2023"));
    }

    #[test]
    fn a_page_without_the_statistics_table_is_a_parse_error() {
        let err = listing()
            .parse(&"<html><table><tr><td>x</td></tr></table></html>".to_string())
            .unwrap_err();
        assert!(matches!(err, ScraperError::Parse(_)));
    }
}
