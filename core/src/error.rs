//! Error types for the CouchDB client.
//!
//! # Design
//! Every failed call returns exactly one `CouchError`. A response that
//! arrived with an error status keeps its full envelope in `Status`, so
//! "document not found" is inspected the same way as a success. The other
//! variants are produced locally and render a synthetic envelope through
//! [`CouchError::envelope`]: status 400 for problems caught before anything
//! was sent, status 500 for everything that went wrong during the exchange.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;

use crate::envelope::Envelope;

/// Errors returned by `Client` methods.
#[derive(Debug, thiserror::Error)]
pub enum CouchError {
    /// The client configuration is unusable, e.g. a malformed base URL.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The request URL is malformed. Nothing was sent.
    #[error("bad request target: {0}")]
    BadTarget(String),

    /// The request body cannot be encoded. Nothing was sent.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No complete response within the client timeout. The request was
    /// dropped.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection-level failure: refused, DNS, reset, TLS.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered, but the body is not JSON.
    #[error("invalid JSON in response body (HTTP {status}): {source}")]
    Parse {
        status: u16,
        headers: BTreeMap<String, String>,
        #[source]
        source: serde_json::Error,
    },

    /// Writing a streamed attachment into the caller's sink failed.
    #[error("attachment sink failed: {0}")]
    Sink(#[source] std::io::Error),

    /// The server answered with an error status (>= 400).
    #[error("HTTP {}: {}", .0.status, .0.message)]
    Status(Box<Envelope>),
}

impl CouchError {
    /// Status code of the failure envelope.
    pub fn status(&self) -> u16 {
        match self {
            CouchError::Config(_) | CouchError::BadTarget(_) | CouchError::InvalidPayload(_) => 400,
            CouchError::Timeout(_)
            | CouchError::Transport(_)
            | CouchError::Parse { .. }
            | CouchError::Sink(_) => 500,
            CouchError::Status(envelope) => envelope.status,
        }
    }

    /// The server's envelope, if the failure came from an error status.
    pub fn response(&self) -> Option<&Envelope> {
        match self {
            CouchError::Status(envelope) => Some(&**envelope),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CouchError::Status(envelope) if envelope.status == 404)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CouchError::Status(envelope) if envelope.status == 409)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CouchError::Timeout(_))
    }

    /// Render the failure as an envelope.
    pub fn envelope(&self) -> Envelope {
        let reason = match self {
            CouchError::Status(envelope) => return (**envelope).clone(),
            CouchError::Parse { status, headers, source } => {
                return Envelope {
                    headers: headers.clone(),
                    data: json!({
                        "error": self.kind(),
                        "reason": source.to_string(),
                        "status": status,
                    }),
                    status: self.status(),
                    message: self.to_string(),
                    duration: None,
                }
            }
            CouchError::Timeout(_) => "request timed out".to_string(),
            CouchError::Config(reason)
            | CouchError::BadTarget(reason)
            | CouchError::InvalidPayload(reason)
            | CouchError::Transport(reason) => reason.clone(),
            CouchError::Sink(source) => source.to_string(),
        };
        Envelope {
            headers: BTreeMap::new(),
            data: json!({ "error": self.kind(), "reason": reason }),
            status: self.status(),
            message: self.to_string(),
            duration: None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CouchError::Config(_) => "config",
            CouchError::BadTarget(_) => "bad_request",
            CouchError::InvalidPayload(_) => "invalid_payload",
            CouchError::Timeout(_) => "timeout",
            CouchError::Transport(_) => "transport",
            CouchError::Parse { .. } => "invalid_json",
            CouchError::Sink(_) => "sink",
            CouchError::Status(_) => "status",
        }
    }
}
