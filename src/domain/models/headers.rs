//! Serializable header set stored alongside each event.

use std::collections::BTreeMap;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// Header name carrying the event type.
pub const EVENT_TYPE_HEADER: &str = "x-github-event";
/// Header name carrying the source's delivery identifier.
pub const DELIVERY_HEADER: &str = "x-github-delivery";
/// Header name carrying the `sha256=<hex>` body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Headers that describe a single hop and must not be replayed downstream.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// `name -> values` multimap, serialized as a JSON object of string arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet(BTreeMap<String, Vec<String>>);

impl HeaderSet {
    /// Capture every header whose value is valid visible ASCII.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut set = BTreeMap::<String, Vec<String>>::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                set.entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        Self(set)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// First value of a header, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rebuild a request header map, dropping hop-by-hop headers and any
    /// entry that is not a legal HTTP header.
    pub fn to_forward_headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, values) in &self.0 {
            let lower = name.to_ascii_lowercase();
            if HOP_BY_HOP.contains(&lower.as_str()) {
                continue;
            }
            let Ok(header_name) = HeaderName::from_bytes(lower.as_bytes()) else {
                tracing::debug!(header = %name, "skipping invalid stored header name");
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        map.append(header_name.clone(), value);
                    }
                    Err(_) => {
                        tracing::debug!(header = %name, "skipping invalid stored header value");
                    }
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_header_map() {
        let mut inbound = HeaderMap::new();
        inbound.insert("x-github-event", HeaderValue::from_static("push"));
        inbound.append("accept", HeaderValue::from_static("a"));
        inbound.append("accept", HeaderValue::from_static("b"));

        let set = HeaderSet::from_header_map(&inbound);
        assert_eq!(set.get("X-GitHub-Event"), Some("push"));

        let forwarded = set.to_forward_headers();
        let accepts: Vec<_> = forwarded.get_all("accept").iter().collect();
        assert_eq!(accepts.len(), 2);
    }

    #[test]
    fn test_forward_headers_drop_hop_by_hop() {
        let mut set = HeaderSet::default();
        set.insert("Host", "relay.example.com");
        set.insert("Content-Length", "42");
        set.insert("Content-Type", "application/json");

        let forwarded = set.to_forward_headers();
        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("content-length").is_none());
        assert_eq!(forwarded.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_stored_mixed_case_names_are_normalized() {
        let set = HeaderSet::from_json(r#"{"X-Github-Delivery":["abc"],"Bad Name":["x"]}"#).unwrap();
        let forwarded = set.to_forward_headers();
        assert_eq!(forwarded.get("x-github-delivery").unwrap(), "abc");
        assert_eq!(forwarded.len(), 1);
    }
}
