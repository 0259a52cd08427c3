//! The stored webhook delivery.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::domain::errors::{StorageError, StorageResult};

/// Longest `id` or `replayed_from` every backend stores verbatim.
pub const MAX_ID_LEN: usize = 512;

/// Longest `event_type`, `repository` or `sender` every backend stores verbatim.
pub const MAX_NAME_LEN: usize = 255;

/// One webhook delivery, original or replayed.
///
/// Rows are immutable once stored except for the `forwarded_at` / `error`
/// pair, which only the forwarding engine touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Delivery identifier for originals, `{original}-replay-{uuid}` for replays.
    pub id: String,
    /// Event category as reported by the source (`push`, `pull_request`, ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// JSON text of the inbound header set, kept verbatim.
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Option<String>,
    /// Raw request body, never mutated.
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replayed_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_time: Option<DateTime<Utc>>,
}

impl Event {
    /// Build a freshly received delivery, pending forwarding.
    pub fn received(
        id: impl Into<String>,
        event_type: impl Into<String>,
        headers: Option<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            headers,
            payload,
            created_at: Utc::now(),
            forwarded_at: None,
            error: None,
            repository: None,
            sender: None,
            replayed_from: None,
            original_time: None,
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_sender(mut self, sender: Option<String>) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Derive a new pending event that copies this one's content.
    ///
    /// The copy gets a fresh `{id}-replay-{uuid}` identifier, so it can never
    /// collide with an existing row.
    pub fn replay(&self) -> Self {
        Self {
            id: format!("{}-replay-{}", self.id, Uuid::new_v4()),
            event_type: self.event_type.clone(),
            headers: self.headers.clone(),
            payload: self.payload.clone(),
            created_at: Utc::now(),
            forwarded_at: None,
            error: None,
            repository: self.repository.clone(),
            sender: self.sender.clone(),
            replayed_from: Some(self.id.clone()),
            original_time: Some(self.created_at),
        }
    }

    /// Reject field values a backend column could not hold unchanged.
    pub fn check_storable(&self) -> StorageResult<()> {
        let limits = [
            ("id", Some(self.id.as_str()), MAX_ID_LEN),
            ("event_type", Some(self.event_type.as_str()), MAX_NAME_LEN),
            ("repository", self.repository.as_deref(), MAX_NAME_LEN),
            ("sender", self.sender.as_deref(), MAX_NAME_LEN),
            ("replayed_from", self.replayed_from.as_deref(), MAX_ID_LEN),
        ];
        for (field, value, max) in limits {
            if value.is_some_and(|v| v.chars().count() > max) {
                return Err(StorageError::InvalidEvent(format!(
                    "{field} is longer than {max} characters"
                )));
            }
        }
        Ok(())
    }

    pub const fn is_pending(&self) -> bool {
        self.forwarded_at.is_none()
    }

    pub const fn is_replay(&self) -> bool {
        self.replayed_from.is_some()
    }
}

/// Embed the payload as JSON when it is JSON, otherwise as a lossy string.
fn serialize_payload<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => value.serialize(serializer),
        Err(_) => serializer.serialize_str(&String::from_utf8_lossy(payload)),
    }
}

fn serialize_headers<S: Serializer>(
    headers: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match headers {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => value.serialize(serializer),
            Err(_) => serializer.serialize_str(raw),
        },
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        Event::received(
            "evt-1",
            "push",
            Some(r#"{"X-Github-Event":["push"]}"#.to_string()),
            br#"{"ref":"refs/heads/main"}"#.to_vec(),
        )
        .with_repository(Some("octo/repo".to_string()))
        .with_sender(Some("octocat".to_string()))
    }

    #[test]
    fn test_received_event_is_pending_original() {
        let event = sample();
        assert!(event.is_pending());
        assert!(!event.is_replay());
        assert!(event.original_time.is_none());
    }

    #[test]
    fn test_replay_copies_content_and_links_source() {
        let original = sample();
        let replay = original.replay();

        assert!(replay.id.starts_with("evt-1-replay-"));
        assert_eq!(replay.replayed_from.as_deref(), Some("evt-1"));
        assert_eq!(replay.original_time, Some(original.created_at));
        assert_eq!(replay.payload, original.payload);
        assert_eq!(replay.headers, original.headers);
        assert_eq!(replay.repository, original.repository);
        assert_eq!(replay.sender, original.sender);
        assert!(replay.is_pending());
    }

    #[test]
    fn test_replay_ids_are_unique() {
        let original = sample();
        assert_ne!(original.replay().id, original.replay().id);
    }

    #[test]
    fn test_storable_limits_count_characters() {
        let mut event = sample();
        event.id = "é".repeat(MAX_ID_LEN);
        event.sender = Some("s".repeat(MAX_NAME_LEN));
        event.check_storable().unwrap();

        event.sender = Some("s".repeat(MAX_NAME_LEN + 1));
        let err = event.check_storable().unwrap_err();
        assert!(matches!(err, StorageError::InvalidEvent(ref msg) if msg.starts_with("sender")));

        // Replaying an id at the limit would overflow it.
        let mut long = sample();
        long.id = "x".repeat(MAX_ID_LEN);
        assert!(long.check_storable().is_ok());
        assert!(long.replay().check_storable().is_err());
    }

    #[test]
    fn test_serialize_embeds_json_payload() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "push");
        assert_eq!(json["payload"]["ref"], "refs/heads/main");
        assert_eq!(json["headers"]["X-Github-Event"][0], "push");
        assert!(json.get("forwarded_at").is_none());
    }

    #[test]
    fn test_serialize_non_json_payload_as_string() {
        let event = Event::received("evt-2", "ping", Some("not json".into()), b"plain".to_vec());
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["payload"], "plain");
        assert_eq!(json["headers"], "not json");
    }
}
