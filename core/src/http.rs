//! HTTP transport types shared by the client and its transports.
//!
//! # Design
//! Requests and responses are described as plain data. `Client::build_*`
//! methods produce an `HttpRequest`; a `Transport` turns it into an
//! `HttpResponse` whose body is still a byte stream, so the executor decides
//! whether to buffer it or pipe it into a sink.
//!
//! A request is created per call and moved into the transport. Nothing here
//! is shared between calls.

use std::fmt;
use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::CouchError;
use crate::payload::Payload;

/// Chunked byte stream used for streaming uploads and response bodies.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    /// CouchDB's non-standard document copy verb.
    Copy,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Copy => "COPY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request body.
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// Sent with chunked transfer encoding, never buffered.
    Stream(ByteStream),
}

impl RequestBody {
    /// The buffered bytes, if this body is not a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Empty => Some(&[]),
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute: base URL, encoded path segments and query string.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Encode `payload` into the body and append its content headers.
    pub fn with_payload(mut self, payload: Payload) -> Result<Self, CouchError> {
        let encoded = payload.encode()?;
        self.headers.extend(encoded.headers);
        self.body = encoded.body;
        Ok(self)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The request body as UTF-8 text, when it is buffered.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// An HTTP response as returned by a `Transport`. The body has not been read.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest::new(HttpMethod::Copy, "http://localhost:5984/db/a")
            .with_header("Destination", "b");
        assert_eq!(req.header("destination"), Some("b"));
        assert_eq!(req.header("DESTINATION"), Some("b"));
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn empty_body_reads_as_empty_text() {
        let req = HttpRequest::new(HttpMethod::Get, "http://localhost:5984/");
        assert_eq!(req.body_text(), Some(""));
        assert!(!req.body.is_stream());
    }

    #[test]
    fn method_names_match_wire_verbs() {
        assert_eq!(HttpMethod::Copy.to_string(), "COPY");
        assert_eq!(HttpMethod::Head.as_str(), "HEAD");
    }
}
