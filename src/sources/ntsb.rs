use crate::config::ScraperConfig;
use crate::constants;
use crate::error::{Result, ScraperError};
use crate::normalize::{
    clean_text, coerce_fatalities, compose_location, compose_route, optional_text, parse_api_date,
};
use crate::sources::{get_with_retry, FetchOptions};
use crate::types::{CrashRecord, CrashSource, ParsedBatch, RawPayload, Source};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Adapter for the NTSB CAROL public query API
pub struct NtsbApi {
    client: reqwest::Client,
    page_size: u32,
    options: FetchOptions,
}

impl NtsbApi {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            page_size: config.page_size,
            options: FetchOptions::from_config(config),
        }
    }

    fn text_field(item: &Value, key: &str) -> String {
        item.get(key)
            .and_then(Value::as_str)
            .map(clean_text)
            .unwrap_or_default()
    }

    fn optional_field(item: &Value, key: &str) -> Option<String> {
        item.get(key).and_then(Value::as_str).and_then(optional_text)
    }

    /// Map one results item 1:1 into a canonical record. Missing fields never
    /// drop the item; they fall through to the normalizer defaults.
    fn record_from_item(item: &Value) -> CrashRecord {
        let event_date = item
            .get("eventDate")
            .and_then(Value::as_str)
            .and_then(parse_api_date);

        let location = compose_location(
            &Self::text_field(item, "city"),
            &Self::text_field(item, "state"),
            &Self::text_field(item, "country"),
        );

        let route = compose_route(
            &Self::text_field(item, "departureAirport"),
            &Self::text_field(item, "destinationAirport"),
        );

        let source_url = match Self::optional_field(item, "eventId") {
            Some(event_id) => {
                format!("{}?eventId={}", constants::NTSB_DETAIL_URL, event_id)
            }
            // Provenance is required; fall back to the endpoint we queried
            None => constants::NTSB_ENDPOINT.to_string(),
        };

        CrashRecord {
            event_date,
            location,
            operator: Self::text_field(item, "operator"),
            aircraft_type: Self::optional_field(item, "aircraftType"),
            registration: Self::optional_field(item, "registration"),
            flight_number: Self::optional_field(item, "flightNumber"),
            route,
            fatalities: coerce_fatalities(item.get("totalFatalities")),
            description: Self::optional_field(item, "narrative"),
            source_url,
            source: Source::Ntsb,
        }
    }
}

#[async_trait::async_trait]
impl CrashSource for NtsbApi {
    fn source(&self) -> Source {
        Source::Ntsb
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<RawPayload> {
        debug!("Fetching NTSB aviation events, page size {}", self.page_size);
        let query = [
            ("page", "1".to_string()),
            ("pageSize", self.page_size.to_string()),
            ("eventType", "Aviation".to_string()),
            ("sortColumn", "EventDate".to_string()),
            ("sortDirection", "DESC".to_string()),
        ];
        get_with_retry(&self.client, constants::NTSB_ENDPOINT, &query, self.options).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParsedBatch> {
        let data: Value = serde_json::from_str(payload)
            .map_err(|e| ScraperError::Parse(format!("NTSB response is not valid JSON: {e}")))?;

        let results = data
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ScraperError::Parse("NTSB response has no results array".to_string())
            })?;

        let mut batch = ParsedBatch::default();
        for (index, item) in results.iter().enumerate() {
            if !item.is_object() {
                let message = format!("results[{index}] is not an object");
                warn!("Skipping malformed NTSB item: {}", message);
                batch.item_errors.push(message);
                continue;
            }
            batch.records.push(Self::record_from_item(item));
        }

        info!(
            "Parsed {} NTSB records ({} malformed items)",
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

    fn api() -> NtsbApi {
        NtsbApi::new(&ScraperConfig::default())
    }

    const PAGE: &str = r#"{
        "results": [
            {
                "eventId": "20230115X00001",
                "eventDate": "2023-01-15T14:30:00Z",
                "city": "Pocatello",
                "state": "Idaho",
                "country": "United States",
                "operator": "  Gem  Air ",
                "aircraftType": "Cessna 172",
                "registration": "N735BH",
                "flightNumber": "GA101",
                "departureAirport": "PIH",
                "destinationAirport": "BOI",
                "totalFatalities": 2,
                "narrative": "Loss of engine power during cruise."
            },
            {
                "eventDate": "not a date",
                "city": "Unknown"
            },
            "not an object"
        ]
    }"#;

    #[test]
    fn maps_items_one_to_one() {
        let batch = api().parse(&PAGE.to_string()).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.item_errors.len(), 1);
        assert_eq!(batch.items_seen(), 3);

        let full = &batch.records[0];
        assert_eq!(full.event_date, NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(full.location, "Pocatello, Idaho, United States");
        assert_eq!(full.operator, "Gem Air");
        assert_eq!(full.route, "PIH to BOI");
        assert_eq!(full.fatalities, 2);
        assert_eq!(full.flight_number.as_deref(), Some("GA101"));
        assert!(full.source_url.ends_with("?eventId=20230115X00001"));
        assert_eq!(full.source, Source::Ntsb);
    }

    #[test]
    fn items_missing_identifiers_still_produce_records() {
        let batch = api().parse(&PAGE.to_string()).unwrap();
        let sparse = &batch.records[1];
        assert_eq!(sparse.event_date, None);
        assert_eq!(sparse.location, "Unknown");
        assert_eq!(sparse.fatalities, 0);
        assert_eq!(sparse.route, "");
        // Provenance falls back to the endpoint itself
        assert_eq!(sparse.source_url, constants::NTSB_ENDPOINT);
    }

    #[test]
    fn invalid_json_is_a_whole_page_parse_error() {
        let err = api().parse(&"<html>".to_string()).unwrap_err();
        assert!(matches!(err, ScraperError::Parse(_)));
    }

    #[test]
    fn missing_results_array_is_a_whole_page_parse_error() {
        let err = api().parse(&r#"{"count": 0}"#.to_string()).unwrap_err();
        assert!(matches!(err, ScraperError::Parse(_)));
    }
}
