//! Outgoing request payloads.
//!
//! The caller picks the payload kind; the encoder only derives the body and
//! the content headers from it.

use std::fmt;
use std::io;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::error::CouchError;
use crate::http::{ByteStream, RequestBody};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A request body tagged with how it must be sent.
pub enum Payload {
    /// Raw bytes, sent as-is.
    Buffer { bytes: Bytes, content_type: String },
    /// Byte stream, sent chunked without buffering.
    Stream { stream: ByteStream, content_type: String },
    /// JSON document. Must be an object or an array.
    Json(Value),
    /// Text, sent as-is.
    Text { text: String, content_type: String },
}

/// Body and content headers derived from a [`Payload`].
#[derive(Debug)]
pub struct EncodedPayload {
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl Payload {
    /// Serialize `value` into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, CouchError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| CouchError::InvalidPayload(e.to_string()))
    }

    pub fn buffer(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Payload::Buffer {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn stream<S>(stream: S, content_type: impl Into<String>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Payload::Stream {
            stream: stream.boxed(),
            content_type: content_type.into(),
        }
    }

    pub fn text(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Payload::Text {
            text: text.into(),
            content_type: content_type.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Buffer { .. } => "buffer",
            Payload::Stream { .. } => "stream",
            Payload::Json(_) => "json",
            Payload::Text { .. } => "text",
        }
    }

    /// Produce the request body and its content headers.
    ///
    /// Fails with `InvalidPayload` for JSON scalars; nothing is sent then.
    pub fn encode(self) -> Result<EncodedPayload, CouchError> {
        match self {
            Payload::Buffer { bytes, content_type } => Ok(EncodedPayload {
                headers: vec![
                    ("content-type".to_string(), content_type),
                    ("content-length".to_string(), bytes.len().to_string()),
                ],
                body: RequestBody::Bytes(bytes),
            }),
            Payload::Stream { stream, content_type } => Ok(EncodedPayload {
                headers: vec![
                    ("content-type".to_string(), content_type),
                    ("transfer-encoding".to_string(), "chunked".to_string()),
                ],
                body: RequestBody::Stream(stream),
            }),
            Payload::Json(value) => {
                if !(value.is_object() || value.is_array()) {
                    return Err(CouchError::InvalidPayload(format!(
                        "expected a JSON object or array, got {}",
                        json_type(&value)
                    )));
                }
                let text = serde_json::to_string(&value)
                    .map_err(|e| CouchError::InvalidPayload(e.to_string()))?;
                Ok(EncodedPayload {
                    headers: vec![
                        ("content-type".to_string(), JSON_CONTENT_TYPE.to_string()),
                        ("content-length".to_string(), text.len().to_string()),
                    ],
                    body: RequestBody::Bytes(Bytes::from(text)),
                })
            }
            Payload::Text { text, content_type } => Ok(EncodedPayload {
                headers: vec![
                    ("content-type".to_string(), content_type),
                    ("content-length".to_string(), text.len().to_string()),
                ],
                body: RequestBody::Bytes(Bytes::from(text)),
            }),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Buffer { bytes, content_type } => f
                .debug_struct("Buffer")
                .field("len", &bytes.len())
                .field("content_type", content_type)
                .finish(),
            Payload::Stream { content_type, .. } => f
                .debug_struct("Stream")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
            Payload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Payload::Text { text, content_type } => f
                .debug_struct("Text")
                .field("len", &text.len())
                .field("content_type", content_type)
                .finish(),
        }
    }
}
