//! The uniform result of every API call.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response headers, status, resolved message and parsed body of one call.
///
/// Failed calls carry the same shape inside [`CouchError`](crate::CouchError);
/// see [`CouchError::envelope`](crate::CouchError::envelope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub data: Value,
    pub status: u16,
    pub message: String,
    /// Time spent on the network exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl Envelope {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Fold raw response headers into a lower-cased map. Repeated headers are
/// joined with `", "`.
pub(crate) fn header_map(raw: Vec<(String, String)>) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in raw {
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_headers_are_joined() {
        let headers = header_map(vec![
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("cache-control".to_string(), "must-revalidate".to_string()),
            ("ETag".to_string(), "\"1-abc\"".to_string()),
        ]);
        assert_eq!(headers["cache-control"], "no-cache, must-revalidate");
        assert_eq!(headers["etag"], "\"1-abc\"");
    }

    #[test]
    fn header_accessor_ignores_case() {
        let envelope = Envelope {
            headers: header_map(vec![("ETag".to_string(), "\"2-x\"".to_string())]),
            data: json!({}),
            status: 200,
            message: "OK".to_string(),
            duration: None,
        };
        assert_eq!(envelope.header("ETAG"), Some("\"2-x\""));
        assert!(envelope.is_success());
    }

    #[test]
    fn duration_is_omitted_when_absent() {
        let envelope = Envelope {
            headers: BTreeMap::new(),
            data: json!({"ok": true}),
            status: 201,
            message: "Created".to_string(),
            duration: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("duration").is_none());
        assert_eq!(json["data"]["ok"], true);
    }
}
