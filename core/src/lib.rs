//! Async client for the CouchDB HTTP API.
//!
//! # Overview
//! Each API method builds one HTTP request (URL, method, headers, body),
//! sends it through a [`Transport`], and settles into a uniform
//! [`Envelope`]: response headers, parsed JSON body, status code and a
//! status message documented for that operation.
//!
//! # Design
//! - [`Client`] is built once from a [`ClientConfig`]; it owns its timeout
//!   and transport. No per-call state lives on it.
//! - Each operation is split into `build_*` (produces an [`HttpRequest`])
//!   and an async method that executes it, so the wire request can be
//!   checked without a server.
//! - Request bodies are tagged [`Payload`] values; the caller chooses the
//!   encoding.
//! - Attachments download straight into any `tokio::io::AsyncWrite`.
//! - A failed call returns one [`CouchError`], which renders the same
//!   envelope shape via [`CouchError::envelope`].

pub mod client;
pub mod compat;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod http;
pub mod payload;
pub mod query;
pub mod status;
pub mod tables;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use envelope::Envelope;
pub use error::CouchError;
pub use http::{ByteStream, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use payload::Payload;
pub use query::Query;
pub use transport::{ReqwestTransport, Transport};
