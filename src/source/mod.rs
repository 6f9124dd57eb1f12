//! Monitoring data source: wire types and the fetch collaborator.

pub mod http;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::detect::MonitoringWindow;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid monitoring URL: {0}")]
    InvalidUrl(String),
    #[error("monitoring request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("monitoring endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode monitoring response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One interval of one entity as returned by the monitoring endpoints.
///
/// Counters are optional on the wire; absent or null counters read as zero
/// once the series is aligned. The timestamp is carried through untouched in
/// whatever shape the backend sent it, since nothing downstream parses it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSeriesPoint {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub client_uid: String,
    #[serde(default)]
    pub merchant_name: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub success: Option<i64>,
    #[serde(default)]
    pub pending: Option<i64>,
    #[serde(default)]
    pub failed: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
    // Hourly view only. Display data, never classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg7_success: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg7_failed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg7_total: Option<f64>,
}

/// Ordered series of one (merchant, payment method) entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSeries {
    #[serde(default)]
    pub client_uid: String,
    #[serde(default)]
    pub merchant_name: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub data: Vec<ApiSeriesPoint>,
}

impl ApiSeries {
    /// Merchant is identified by its client UID, or by name when the UID is
    /// blank.
    pub fn key(&self) -> SeriesKey {
        let merchant = if self.client_uid.trim().is_empty() {
            self.merchant_name.clone()
        } else {
            self.client_uid.clone()
        };
        SeriesKey {
            merchant,
            payment_method: self.payment_method.clone(),
        }
    }
}

/// Identity of one classified stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesKey {
    pub merchant: String,
    pub payment_method: String,
}

/// Body accepted from the monitoring endpoints and from saved responses:
/// either the `{ "data": [...] }` envelope or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Value")]
pub struct SeriesPayload(Vec<ApiSeries>);

impl SeriesPayload {
    pub fn into_series(self) -> Vec<ApiSeries> {
        self.0
    }
}

impl TryFrom<Value> for SeriesPayload {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        series_from_value(value).map(SeriesPayload)
    }
}

/// Decode an already-parsed body. The shape is picked from the top-level
/// JSON type so a bad field reports its own error.
pub fn series_from_value(value: Value) -> Result<Vec<ApiSeries>, serde_json::Error> {
    match value {
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(data) => serde_json::from_value(data),
            None => Err(serde_json::Error::missing_field("data")),
        },
        bare @ Value::Array(_) => serde_json::from_value(bare),
        other => Err(serde_json::Error::custom(format!(
            "expected a series array or a {{\"data\": [...]}} envelope, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a monitoring response body.
pub fn parse_series(body: &str) -> Result<Vec<ApiSeries>, SourceError> {
    let value: Value = serde_json::from_str(body)?;
    Ok(series_from_value(value)?)
}

/// Supplier of monitoring series for one window ending at `end`.
#[async_trait::async_trait]
pub trait MonitoringSource: Send + Sync {
    async fn fetch(&self, window: MonitoringWindow, end: DateTime<Utc>) -> Result<Vec<ApiSeries>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"{
        "data": [
            {
                "client_uid": "c-001",
                "merchant_name": "Acme Store",
                "payment_method": "qris",
                "data": [
                    {"timestamp": "2024-05-01T10:00:00+07:00", "client_uid": "c-001", "merchant_name": "Acme Store",
                     "payment_method": "qris", "success": 12, "pending": 1, "failed": 0, "total": 13},
                    {"timestamp": "2024-05-01T11:00:00+07:00", "client_uid": "c-001", "merchant_name": "Acme Store",
                     "payment_method": "qris", "success": 9, "pending": null, "total": 9,
                     "avg7_success": 10.5, "avg7_failed": 0.2, "avg7_total": 11.0}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_envelope() {
        let series = parse_series(ENVELOPE).unwrap();
        assert_eq!(series.len(), 1);
        let s = &series[0];
        assert_eq!(s.payment_method, "qris");
        assert_eq!(s.data.len(), 2);
        assert_eq!(s.data[0].success, Some(12));
        assert_eq!(s.data[1].pending, None);
        assert_eq!(s.data[1].failed, None);
        assert_eq!(s.data[1].avg7_success, Some(10.5));
        assert_eq!(
            s.data[0].timestamp,
            Some(Value::from("2024-05-01T10:00:00+07:00"))
        );
    }

    #[test]
    fn test_parse_bare_array() {
        let series = parse_series(r#"[{"client_uid": "", "merchant_name": "Shop", "payment_method": "va", "data": []}]"#).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].key().merchant, "Shop");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_series("{\"rows\": 1}"), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_parse_keeps_non_rfc3339_timestamps() {
        let body = r#"{"data": [{"client_uid": "c-2", "merchant_name": "Two", "payment_method": "va", "data": [
            {"timestamp": "2024-05-01 10:00:00", "success": 4},
            {"timestamp": "2024-05-01T11:00:00", "success": 5},
            {"timestamp": 1714532400000, "success": 6},
            {"success": 7}
        ]}]}"#;
        let series = parse_series(body).unwrap();
        let points = &series[0].data;
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].timestamp, Some(Value::from("2024-05-01 10:00:00")));
        assert_eq!(points[1].timestamp, Some(Value::from("2024-05-01T11:00:00")));
        assert_eq!(points[2].timestamp, Some(Value::from(1714532400000_i64)));
        assert_eq!(points[3].timestamp, None);
        assert_eq!(points[2].success, Some(6));
    }

    #[test]
    fn test_decode_error_names_the_bad_field() {
        let envelope = r#"{"data": [{"payment_method": "qris", "data": [{"success": "twelve"}]}]}"#;
        let err = parse_series(envelope).unwrap_err().to_string();
        assert!(err.contains("invalid type"), "{}", err);
        assert!(!err.contains("did not match any variant"), "{}", err);

        let bare = r#"[{"payment_method": "qris", "data": [{"failed": true}]}]"#;
        let err = parse_series(bare).unwrap_err().to_string();
        assert!(err.contains("invalid type"), "{}", err);

        let err = parse_series("{\"rows\": 1}").unwrap_err().to_string();
        assert!(err.contains("missing field `data`"), "{}", err);

        let err = parse_series("42").unwrap_err().to_string();
        assert!(err.contains("got a number"), "{}", err);
    }

    #[test]
    fn test_payload_extractor_shares_decoding() {
        let payload: SeriesPayload =
            serde_json::from_str(r#"[{"merchant_name": "Shop", "data": [{"timestamp": "yesterday"}]}]"#).unwrap();
        assert_eq!(payload.into_series()[0].data.len(), 1);

        let err = serde_json::from_str::<SeriesPayload>(r#"{"data": [{"data": [{"pending": "x"}]}]}"#).unwrap_err();
        assert!(err.to_string().contains("invalid type"), "{}", err);
    }

    #[test]
    fn test_key_prefers_client_uid() {
        let s = ApiSeries {
            client_uid: "c-9".into(),
            merchant_name: "Nine".into(),
            payment_method: "cc".into(),
            data: vec![],
        };
        assert_eq!(
            s.key(),
            SeriesKey {
                merchant: "c-9".into(),
                payment_method: "cc".into()
            }
        );
    }
}
