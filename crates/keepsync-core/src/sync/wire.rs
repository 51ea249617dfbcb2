//! JSON wire format shared by every collection.
//!
//! Request: `{"records": [RecordWire, ...]}`
//! Response: `{"records": [RecordWire, ...], "syncedAt": "<ISO-8601>"}`
//!
//! Timestamps are UTC ISO-8601 with millisecond fractional seconds.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::SyncError;
use crate::models::{Payload, Record};
use crate::util::compact_text;

/// Wire representation of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
pub struct RecordWire<P> {
    pub id: String,
    #[serde(flatten)]
    pub payload: P,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl<P: Payload> RecordWire<P> {
    pub fn from_record(record: &Record<P>) -> Self {
        Self {
            id: record.id.to_string(),
            payload: record.payload.clone(),
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
            is_deleted: record.is_deleted,
            metadata: record.metadata.clone(),
        }
    }

    /// Convert to a clean local record.
    pub fn into_record(self) -> Result<Record<P>, SyncError> {
        let id = self
            .id
            .parse()
            .map_err(|_| SyncError::Decode("record with empty id".to_string()))?;
        let created_at = parse_timestamp(&self.created_at)
            .map_err(|error| SyncError::Decode(format!("record {}: {error}", self.id)))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .map_err(|error| SyncError::Decode(format!("record {}: {error}", self.id)))?;

        Ok(Record {
            id,
            payload: self.payload,
            created_at,
            updated_at,
            is_deleted: self.is_deleted,
            is_dirty: false,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Serialize)]
struct SyncRequestBody<P> {
    records: Vec<RecordWire<P>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
struct SyncResponseBody<P> {
    #[serde(default = "Vec::new")]
    records: Vec<RecordWire<P>>,
    #[serde(rename = "syncedAt")]
    synced_at: String,
}

/// Decoded 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullBatch<P> {
    pub records: Vec<Record<P>>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp with or without fractional seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| SyncError::Decode(format!("invalid timestamp '{raw}': {error}")))
}

/// Serialize the push batch.
pub fn encode_request<P: Payload>(records: &[Record<P>]) -> Result<String, SyncError> {
    let body = SyncRequestBody {
        records: records.iter().map(RecordWire::from_record).collect(),
    };
    serde_json::to_string(&body).map_err(|error| SyncError::Encode(error.to_string()))
}

/// Decode a 2xx body. Any malformed record fails the whole batch.
pub fn decode_response<P: Payload>(body: &str) -> Result<PullBatch<P>, SyncError> {
    let response = serde_json::from_str::<SyncResponseBody<P>>(body)
        .map_err(|error| SyncError::Decode(error.to_string()))?;
    let synced_at = parse_timestamp(&response.synced_at)?;
    let records = response
        .records
        .into_iter()
        .map(RecordWire::into_record)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PullBatch { records, synced_at })
}

/// Human-readable message for a non-2xx response.
pub fn parse_error_body(status: u16, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", message.trim(), status);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("{trimmed} ({status})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryEntry, LinkStatus, SavedLink};
    use pretty_assertions::assert_eq;

    fn at(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn timestamps_use_millisecond_utc_format() {
        let value = at("2025-01-01T08:30:00.123456+08:00");
        assert_eq!(format_timestamp(value), "2025-01-01T00:30:00.123Z");
    }

    #[test]
    fn parse_accepts_whole_seconds() {
        assert_eq!(
            at("2025-01-01T00:00:00Z"),
            at("2025-01-01T00:00:00.000Z")
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn request_body_matches_wire_shape() {
        let mut record = Record::new(
            HistoryEntry::new("https://x/1", "bilibili", true, 4),
            at("2025-02-03T04:05:06.789Z"),
        );
        record.is_deleted = true;

        let raw = encode_request(std::slice::from_ref(&record)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let wire = &json["records"][0];

        assert_eq!(wire["id"], record.id.as_str());
        assert_eq!(wire["url"], "https://x/1");
        assert_eq!(wire["downloader"], "bilibili");
        assert_eq!(wire["media_count"], 4);
        assert_eq!(wire["is_success"], true);
        assert_eq!(wire["created_at"], "2025-02-03T04:05:06.789Z");
        assert_eq!(wire["updated_at"], "2025-02-03T04:05:06.789Z");
        assert_eq!(wire["is_deleted"], true);
        assert!(wire.get("is_dirty").is_none());
        assert!(wire.get("metadata").is_none());
    }

    #[test]
    fn response_decodes_into_clean_records() {
        let body = r#"{
            "records": [{
                "id": "A1B2",
                "url": "https://x/2",
                "downloader": "pixiv",
                "status": "success",
                "created_at": "2025-01-01T00:00:00.000Z",
                "updated_at": "2025-01-02T00:00:00Z",
                "is_deleted": false,
                "metadata": {"source": "web"}
            }],
            "syncedAt": "2025-01-02T00:00:01.500Z"
        }"#;

        let batch = decode_response::<SavedLink>(body).unwrap();
        assert_eq!(batch.synced_at, at("2025-01-02T00:00:01.5Z"));
        let record = &batch.records[0];
        assert_eq!(record.id.as_str(), "A1B2");
        assert_eq!(record.payload.status, LinkStatus::Success);
        assert!(!record.is_dirty);
        assert_eq!(
            record.metadata.as_ref().and_then(|map| map.get("source")).map(String::as_str),
            Some("web")
        );
    }

    #[test]
    fn response_tolerates_missing_optional_fields() {
        let body = r#"{
            "records": [{
                "id": "r1",
                "url": "https://x/3",
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z"
            }],
            "syncedAt": "2025-01-01T00:00:00Z"
        }"#;

        let batch = decode_response::<SavedLink>(body).unwrap();
        assert_eq!(batch.records[0].payload.status, LinkStatus::None);
        assert!(!batch.records[0].is_deleted);
    }

    #[test]
    fn malformed_record_fails_the_batch() {
        let body = r#"{
            "records": [{
                "id": "r1",
                "url": "https://x/3",
                "created_at": "not a date",
                "updated_at": "2025-01-01T00:00:00Z"
            }],
            "syncedAt": "2025-01-01T00:00:00Z"
        }"#;
        let error = decode_response::<SavedLink>(body).unwrap_err();
        assert!(matches!(error, SyncError::Decode(_)));
        assert!(error.to_string().contains("r1"));

        assert!(decode_response::<SavedLink>(r#"{"records": []}"#).is_err());
        assert!(decode_response::<SavedLink>("<html>").is_err());
    }

    #[test]
    fn error_body_prefers_structured_message() {
        assert_eq!(
            parse_error_body(401, r#"{"error":"invalid token"}"#),
            "invalid token (401)"
        );
        assert_eq!(parse_error_body(502, "bad gateway"), "bad gateway (502)");
        assert_eq!(parse_error_body(500, "   "), "HTTP 500");
    }
}
