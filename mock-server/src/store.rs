//! In-memory document store behind the mock server.
//!
//! Only the current revision of each document is kept. Deleted documents
//! stay as tombstones so a re-created document continues the revision count.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub rev: String,
    pub deleted: bool,
    pub body: Map<String, Value>,
    pub attachments: BTreeMap<String, Attachment>,
}

impl StoredDoc {
    /// The document as returned by GET: `_id`, `_rev`, body, attachment stubs.
    pub fn render(&self, id: &str) -> Value {
        let mut out = Map::new();
        out.insert("_id".to_string(), json!(id));
        out.insert("_rev".to_string(), json!(self.rev));
        out.extend(self.body.clone());
        if !self.attachments.is_empty() {
            let stubs: Map<String, Value> = self
                .attachments
                .iter()
                .map(|(name, att)| {
                    (
                        name.clone(),
                        json!({
                            "content_type": att.content_type,
                            "length": att.data.len(),
                            "stub": true,
                        }),
                    )
                })
                .collect();
            out.insert("_attachments".to_string(), Value::Object(stubs));
        }
        Value::Object(out)
    }
}

#[derive(Debug, Clone)]
pub struct Index {
    pub ddoc: String,
    pub name: String,
    pub fields: Value,
}

#[derive(Debug, Default)]
pub struct Database {
    pub docs: BTreeMap<String, StoredDoc>,
    pub indexes: Vec<Index>,
    pub update_seq: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WriteError {
    Conflict,
}

impl Database {
    pub fn live(&self, id: &str) -> Option<&StoredDoc> {
        self.docs.get(id).filter(|doc| !doc.deleted)
    }

    pub fn live_docs(&self) -> impl Iterator<Item = (&String, &StoredDoc)> {
        self.docs.iter().filter(|(_, doc)| !doc.deleted)
    }

    pub fn doc_count(&self) -> usize {
        self.live_docs().count()
    }

    pub fn info(&self, name: &str) -> Value {
        json!({
            "db_name": name,
            "doc_count": self.doc_count(),
            "doc_del_count": self.docs.len() - self.doc_count(),
            "update_seq": self.update_seq.to_string(),
            "purge_seq": "0",
            "compact_running": false,
            "sizes": {"active": 0, "external": 0, "file": 0},
            "instance_start_time": "0",
        })
    }

    /// Store a new revision of `id`.
    ///
    /// `rev` must name the current revision of a live document; it must be
    /// absent (or the tombstone's) when the document is new or deleted.
    /// `_id`, `_rev`, `_deleted` and `_attachments` are taken out of `body`.
    pub fn write(
        &mut self,
        id: &str,
        mut body: Map<String, Value>,
        rev: Option<String>,
    ) -> Result<String, WriteError> {
        body.remove("_id");
        body.remove("_attachments");
        let body_rev = body.remove("_rev").and_then(|v| v.as_str().map(str::to_string));
        let rev = rev.or(body_rev);
        let deleted = body.remove("_deleted").and_then(|v| v.as_bool()).unwrap_or(false);

        let current = self.docs.get(id);
        let attachments = match current {
            Some(doc) if !doc.deleted => {
                if rev.as_deref() != Some(doc.rev.as_str()) {
                    return Err(WriteError::Conflict);
                }
                doc.attachments.clone()
            }
            Some(tombstone) => {
                if rev.as_deref().is_some_and(|r| r != tombstone.rev) {
                    return Err(WriteError::Conflict);
                }
                BTreeMap::new()
            }
            None => {
                if rev.is_some() {
                    return Err(WriteError::Conflict);
                }
                BTreeMap::new()
            }
        };
        if deleted && current.map_or(true, |doc| doc.deleted) {
            return Err(WriteError::Conflict);
        }

        let new_rev = next_rev(current.map(|doc| doc.rev.as_str()));
        let doc = StoredDoc {
            rev: new_rev.clone(),
            deleted,
            body: if deleted { Map::new() } else { body },
            attachments: if deleted { BTreeMap::new() } else { attachments },
        };
        self.docs.insert(id.to_string(), doc);
        self.update_seq += 1;
        Ok(new_rev)
    }

    /// Bump the revision of a live document after an attachment change.
    pub fn touch(&mut self, id: &str) -> Option<String> {
        let doc = self.docs.get_mut(id)?;
        doc.rev = next_rev(Some(&doc.rev));
        self.update_seq += 1;
        Some(doc.rev.clone())
    }
}

/// `N-hex` revision following `current`.
pub fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_valid_db_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '$' | '(' | ')' | '+' | '-' | '/'))
}

// ---------------------------------------------------------------------------
// Row selection for _all_docs and views
// ---------------------------------------------------------------------------

/// Key-range and paging options shared by `_all_docs` and views. Rows are
/// keyed by document id.
#[derive(Debug, Default)]
pub struct RowQuery {
    pub key: Option<String>,
    pub keys: Option<Vec<String>>,
    pub startkey: Option<String>,
    pub endkey: Option<String>,
    pub inclusive_end: bool,
    pub descending: bool,
    pub include_docs: bool,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl RowQuery {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let json_string = |name: &str| -> Result<Option<String>, String> {
            match params.get(name) {
                None => Ok(None),
                Some(raw) => match serde_json::from_str::<Value>(raw) {
                    Ok(Value::String(s)) => Ok(Some(s)),
                    Ok(other) => Ok(Some(other.to_string())),
                    Err(_) => Err(format!("invalid JSON for {name}: {raw}")),
                },
            }
        };
        let flag = |name: &str, default: bool| params.get(name).map_or(default, |v| v == "true");
        let number = |name: &str| -> Result<Option<usize>, String> {
            params
                .get(name)
                .map(|v| v.parse::<usize>().map_err(|_| format!("invalid integer for {name}: {v}")))
                .transpose()
        };

        let keys = match params.get("keys") {
            None => None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(items)) => Some(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => s,
                            other => other.to_string(),
                        })
                        .collect(),
                ),
                _ => return Err("`keys` must be a JSON array".to_string()),
            },
        };

        Ok(Self {
            key: json_string("key")?,
            keys,
            startkey: json_string("startkey")?,
            endkey: json_string("endkey")?,
            inclusive_end: flag("inclusive_end", true),
            descending: flag("descending", false),
            include_docs: flag("include_docs", false),
            limit: number("limit")?,
            skip: number("skip")?.unwrap_or(0),
        })
    }

    /// Pick rows from `docs` (ascending by id). Missing `keys` entries come
    /// back as `None`.
    pub fn select<'a, I>(&self, docs: I) -> Vec<(String, Option<&'a StoredDoc>)>
    where
        I: Iterator<Item = (&'a String, &'a StoredDoc)>,
    {
        let docs: BTreeMap<&String, &StoredDoc> = docs.collect();
        let mut rows: Vec<(String, Option<&StoredDoc>)> = match &self.keys {
            Some(keys) => keys
                .iter()
                .map(|key| (key.clone(), docs.get(key).copied()))
                .collect(),
            None => {
                let mut rows: Vec<_> = docs
                    .iter()
                    .filter(|(id, _)| self.in_range(id.as_str()))
                    .map(|(id, doc)| ((*id).clone(), Some(*doc)))
                    .collect();
                if self.descending {
                    rows.reverse();
                }
                rows
            }
        };
        rows = rows.into_iter().skip(self.skip).collect();
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn in_range(&self, id: &str) -> bool {
        if let Some(key) = &self.key {
            return id == key;
        }
        let (low, high) = if self.descending {
            (self.endkey.as_deref(), self.startkey.as_deref())
        } else {
            (self.startkey.as_deref(), self.endkey.as_deref())
        };
        let exclusive_low = self.descending && !self.inclusive_end;
        let exclusive_high = !self.descending && !self.inclusive_end;
        let above_low = low.map_or(true, |low| match id.cmp(low) {
            Ordering::Greater => true,
            Ordering::Equal => !exclusive_low,
            Ordering::Less => false,
        });
        let below_high = high.map_or(true, |high| match id.cmp(high) {
            Ordering::Less => true,
            Ordering::Equal => !exclusive_high,
            Ordering::Greater => false,
        });
        above_low && below_high
    }
}

// ---------------------------------------------------------------------------
// Mango selectors
// ---------------------------------------------------------------------------

/// Top-level field selector with `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`,
/// `$in` and `$exists`. Anything else never matches.
pub fn matches_selector(doc: &Value, selector: &Map<String, Value>) -> bool {
    selector.iter().all(|(field, condition)| {
        let value = doc.get(field);
        match condition {
            Value::Object(ops) if ops.keys().all(|op| op.starts_with('$')) => {
                ops.iter().all(|(op, operand)| apply_operator(value, op, operand))
            }
            literal => value == Some(literal),
        }
    })
}

fn apply_operator(value: Option<&Value>, op: &str, operand: &Value) -> bool {
    let Some(value) = value else {
        return op == "$exists" && operand == &Value::Bool(false);
    };
    match op {
        "$eq" => value == operand,
        "$ne" => value != operand,
        "$exists" => operand == &Value::Bool(true),
        "$in" => operand.as_array().is_some_and(|items| items.contains(value)),
        "$gt" => compare(value, operand) == Some(Ordering::Greater),
        "$gte" => matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => compare(value, operand) == Some(Ordering::Less),
        "$lte" => matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Keep only `fields` of `doc`.
pub fn project(doc: Value, fields: Option<&Vec<Value>>) -> Value {
    match (fields, doc) {
        (Some(fields), Value::Object(mut map)) => Value::Object(
            fields
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|field| map.remove(field).map(|v| (field.to_string(), v)))
                .collect(),
        ),
        (_, doc) => doc,
    }
}
