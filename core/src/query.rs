//! URL path and query string construction.
//!
//! Every caller-supplied path segment goes through [`encode_segment`] on its
//! own, so a `/` inside a document id never splits the path. Query values for
//! the view keys `key`, `keys`, `startkey` and `endkey` are JSON text on the
//! wire (`startkey="a"`), everything else is plain form encoding.

use serde_json::Value;

/// Query keys whose values are sent as JSON text.
pub const JSON_KEYS: [&str; 4] = ["key", "keys", "startkey", "endkey"];

/// Ordered set of query parameters. Setting a name twice replaces the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: Vec<(String, Value)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Form-encoded query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::with_capacity(self.params.len());
        for (name, value) in &self.params {
            if JSON_KEYS.contains(&name.as_str()) {
                pairs.push(pair(name, &value.to_string()));
                continue;
            }
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| pair(name, &plain_value(item))));
                }
                other => pairs.push(pair(name, &plain_value(other))),
            }
        }
        pairs.join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (name, value) in iter {
            query.set(name, value);
        }
        query
    }
}

fn pair(name: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Percent-encode a single path segment.
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Append `?query` to `path` unless the query is absent or empty.
pub fn with_query(path: String, query: Option<&Query>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{}", query.to_query_string()),
        _ => path,
    }
}
