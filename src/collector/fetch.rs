//! Fetching zone counts from the facility-count API.

use crate::collector::types::ZoneRecord;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fetch errors. Any of these means the whole fetch produced nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
    /// Network failure or timeout
    #[error("network error: {0}")]
    Network(String),
    /// Server returned a non-success status
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// Body was not a list of zone records
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// A source of raw zone records.
#[allow(async_fn_in_trait)]
pub trait ZoneSource {
    async fn fetch(&self) -> Result<Vec<ZoneRecord>, FetchError>;
}

/// [`ZoneSource`] backed by the GoBoard HTTP API.
pub struct HttpZoneSource {
    client: reqwest::Client,
    url: String,
}

impl HttpZoneSource {
    /// Create a source with a bounded request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl ZoneSource for HttpZoneSource {
    async fn fetch(&self) -> Result<Vec<ZoneRecord>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        parse_zone_records(&body)
    }
}

/// Decode an API response body.
///
/// The body must be a JSON array. Elements that do not decode as a
/// [`ZoneRecord`] are dropped one by one, so a malformed entry for some other
/// zone never costs the readings of the rest.
pub fn parse_zone_records(body: &str) -> Result<Vec<ZoneRecord>, FetchError> {
    let elements: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let records = elements
        .into_iter()
        .filter_map(|element| match serde_json::from_value::<ZoneRecord>(element) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping malformed zone record: {e}");
                None
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zone_records() {
        let body = r#"[
            {"LocationId": 3903, "FacilityId": 802, "LocationName": "Free Weight Zone", "LastCount": 40, "TotalCapacity": 100},
            {"LocationId": 9999, "FacilityId": 900}
        ]"#;
        let records = parse_zone_records(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].last_count, Some(40));
        assert_eq!(records[1].total_capacity, None);
    }

    #[test]
    fn test_malformed_record_is_dropped_alone() {
        let body = r#"[
            {"LocationId": 3903, "FacilityId": 802, "LastCount": 40, "TotalCapacity": 100},
            {"LocationId": 1, "LastCount": "N/A"},
            "not an object"
        ]"#;
        let records = parse_zone_records(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location_id, Some(3903));
    }

    #[test]
    fn test_bad_untracked_record_keeps_tracked_reading() {
        let body = r#"[
            {"LocationId": 3903, "FacilityId": 802, "LastCount": 40, "TotalCapacity": 100},
            {"LocationId": 1, "FacilityId": 802, "LastCount": "N/A"}
        ]"#;
        let filter = crate::collector::ZoneFilter::new(&crate::config::Config::default());
        // Monday 09:00
        let at = chrono::NaiveDate::from_ymd_opt(2025, 1, 13)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let readings = filter.filter(&parse_zone_records(body).unwrap(), at);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].zone_id, 3903);
        assert_eq!(readings[0].percentage(), 40.0);
    }

    #[test]
    fn test_parse_rejects_non_list() {
        let err = parse_zone_records(r#"{"error": "bad key"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "server error (503): unavailable");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 on localhost is almost never listening.
        let source =
            HttpZoneSource::new("http://127.0.0.1:9/counts", Duration::from_secs(2)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
