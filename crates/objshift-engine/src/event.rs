//! Storage-change events and notification decoding.
//!
//! The transport delivers opaque messages whose bodies carry a JSON
//! notification envelope (`{"Records": [...]}`). One message may bundle
//! several change records; a body without a recognized record list decodes to
//! zero events rather than an error, since notification systems also deliver
//! test events and unrelated payloads on the same queue.
//!
//! Object keys arrive URL-encoded on the wire (with `+` standing in for
//! space) and are decoded here, before any key mapping sees them.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

/// The kind of storage change a notification reports.
///
/// Closed set: records with any other event name are dropped during
/// decoding, so downstream matching is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An object version was created in the source location.
    Created,
    /// An object version was removed from the source location.
    Removed,
}

/// One notification about one object version.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// What happened to the object.
    pub kind: ChangeKind,
    /// Bucket the change occurred in.
    pub bucket: String,
    /// Object key, URL-decoded.
    pub key: String,
    /// Version token of the affected object version.
    pub version_id: String,
    /// When the storage system recorded the change.
    pub event_time: DateTime<Utc>,
}

/// One unit of delivery from the notification transport.
///
/// The body is opaque to the transport; [`decode_events`] unpacks it. The
/// ack token is what the engine hands back to the transport once the event's
/// outcome is decided.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Transport-assigned message identifier.
    pub message_id: String,
    /// Token used to acknowledge (remove) this message.
    pub ack_token: String,
    /// Raw message body.
    pub body: String,
}

impl QueueMessage {
    /// Creates a new queue message.
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        ack_token: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            ack_token: ack_token.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRecord {
    event_name: String,
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
    s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
struct StorageEntity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectEntity {
    key: String,
    #[serde(default)]
    version_id: String,
}

/// Decodes a message body into zero or more change events.
///
/// Bodies that are not valid JSON, carry no `Records` array, or contain
/// records with unrecognized event names contribute no events. Keys are
/// percent-decoded with `+` mapped to space.
#[must_use]
pub fn decode_events(body: &str) -> Vec<ChangeEvent> {
    let Ok(envelope) = serde_json::from_str::<NotificationEnvelope>(body) else {
        return Vec::new();
    };

    envelope
        .records
        .into_iter()
        .filter_map(|record| {
            let kind = if record.event_name.starts_with("ObjectCreated") {
                ChangeKind::Created
            } else if record.event_name.starts_with("ObjectRemoved") {
                ChangeKind::Removed
            } else {
                return None;
            };

            Some(ChangeEvent {
                kind,
                bucket: record.s3.bucket.name,
                key: decode_key(&record.s3.object.key),
                version_id: record.s3.object.version_id,
                event_time: record.event_time.unwrap_or_else(Utc::now),
            })
        })
        .collect()
}

/// Decodes a wire-format object key: percent escapes, then `+` as space.
fn decode_key(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8_lossy()
        .replace('+', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(event_name: &str, key: &str, version_id: &str) -> String {
        format!(
            r#"{{"eventName":"{event_name}","eventTime":"2024-03-01T12:00:00Z",
                "s3":{{"bucket":{{"name":"src-bucket"}},
                       "object":{{"key":"{key}","versionId":"{version_id}"}}}}}}"#
        )
    }

    #[test]
    fn decodes_created_and_removed_records() {
        let body = format!(
            r#"{{"Records":[{created},{removed}]}}"#,
            created = record_json("ObjectCreated:Put", "a/b.json", "V1"),
            removed = record_json("ObjectRemoved:Delete", "a/b.json", "V2"),
        );

        let events = decode_events(&body);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeKind::Created);
        assert_eq!(events[0].bucket, "src-bucket");
        assert_eq!(events[0].version_id, "V1");
        assert_eq!(events[1].kind, ChangeKind::Removed);
        assert_eq!(events[1].version_id, "V2");
    }

    #[test]
    fn unrecognized_event_names_are_dropped() {
        let body = format!(
            r#"{{"Records":[{rec}]}}"#,
            rec = record_json("ReducedRedundancyLostObject", "a.json", "V1"),
        );
        assert!(decode_events(&body).is_empty());
    }

    #[test]
    fn body_without_records_yields_no_events() {
        assert!(decode_events(r#"{"Event":"TestEvent"}"#).is_empty());
        assert!(decode_events("not json at all").is_empty());
    }

    #[test]
    fn keys_are_url_decoded() {
        let body = format!(
            r#"{{"Records":[{rec}]}}"#,
            rec = record_json("ObjectCreated:Put", "reports/my+file%3D1.json", "V1"),
        );

        let events = decode_events(&body);
        assert_eq!(events[0].key, "reports/my file=1.json");
    }

    #[test]
    fn missing_version_id_defaults_to_empty() {
        let body = r#"{"Records":[{"eventName":"ObjectCreated:Put",
            "s3":{"bucket":{"name":"b"},"object":{"key":"k"}}}]}"#;

        let events = decode_events(body);
        assert_eq!(events.len(), 1);
        assert!(events[0].version_id.is_empty());
    }
}
