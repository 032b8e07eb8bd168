//! CouchDB API surface.
//!
//! # Design
//! Every operation is split into a synchronous `build_*` method that
//! produces the `HttpRequest` and an async method that sends it with the
//! operation's status table. The builders do all encoding up front, so a
//! payload that cannot be sent fails before the transport is touched, and
//! the exact wire request can be inspected without a server.
//!
//! The client holds the base URL, the transport and the request timeout.
//! Headers and bodies are built fresh for each call; the timeout is read
//! once when a call starts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncWrite;

use crate::config::{check_url, duration_ms, redact, ClientConfig};
use crate::envelope::Envelope;
use crate::error::CouchError;
use crate::executor;
use crate::http::{HttpMethod, HttpRequest};
use crate::payload::Payload;
use crate::query::{encode_segment, with_query, Query};
use crate::status::StatusTable;
use crate::tables;
use crate::transport::{ReqwestTransport, Transport};

/// Async client bound to one CouchDB server.
pub struct Client {
    base_url: String,
    timeout_ms: AtomicU64,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Build a client with the default `reqwest` transport.
    ///
    /// Fails with `CouchError::Config` if the base URL is not an absolute
    /// http(s) URL with a host.
    pub fn new(config: ClientConfig) -> Result<Self, CouchError> {
        let base_url = check_url(&config.base_url).map_err(CouchError::Config)?;
        let transport = ReqwestTransport::new(config.verify_certificate)?;
        Ok(Self::assemble(base_url, &config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, CouchError> {
        let base_url = check_url(&config.base_url).map_err(CouchError::Config)?;
        Ok(Self::assemble(base_url, &config, transport))
    }

    fn assemble(base_url: String, config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            timeout_ms: AtomicU64::new(config.request_timeout_ms),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Applies to calls started after this returns.
    pub fn set_request_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(duration_ms(timeout), Ordering::Relaxed);
    }

    fn url(&self, segments: &[&str], query: Option<&Query>) -> String {
        let mut url = self.base_url.clone();
        if segments.is_empty() {
            url.push('/');
        }
        for segment in segments {
            url.push('/');
            url.push_str(&encode_segment(segment));
        }
        with_query(url, query)
    }

    async fn execute(&self, request: HttpRequest, statuses: &StatusTable) -> Result<Envelope, CouchError> {
        let timeout = self.request_timeout();
        executor::execute(self.transport.as_ref(), request, statuses, timeout).await
    }

    // -----------------------------------------------------------------------
    // Server
    // -----------------------------------------------------------------------

    pub fn build_get_info(&self) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[], None))
    }

    /// Server welcome document (version, vendor).
    pub async fn get_info(&self) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_info(), tables::SERVER_INFO).await
    }

    pub fn build_list_databases(&self) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&["_all_dbs"], None))
    }

    pub async fn list_databases(&self) -> Result<Envelope, CouchError> {
        self.execute(self.build_list_databases(), tables::ALL_DBS).await
    }

    pub fn build_get_uuids(&self, count: u32) -> HttpRequest {
        let query = Query::new().param("count", count);
        HttpRequest::new(HttpMethod::Get, self.url(&["_uuids"], Some(&query)))
    }

    pub async fn get_uuids(&self, count: u32) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_uuids(count), tables::UUIDS).await
    }

    // -----------------------------------------------------------------------
    // Databases
    // -----------------------------------------------------------------------

    pub fn build_create_database(&self, db: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Put, self.url(&[db], None))
    }

    pub async fn create_database(&self, db: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_create_database(db), tables::CREATE_DATABASE).await
    }

    pub fn build_get_database(&self, db: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db], None))
    }

    pub async fn get_database(&self, db: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_database(db), tables::GET_DATABASE).await
    }

    pub fn build_get_database_head(&self, db: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Head, self.url(&[db], None))
    }

    /// Existence check; `data` is always `{}`.
    pub async fn get_database_head(&self, db: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_database_head(db), tables::GET_DATABASE).await
    }

    pub fn build_delete_database(&self, db: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&[db], None))
    }

    pub async fn delete_database(&self, db: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_delete_database(db), tables::DELETE_DATABASE).await
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn build_get_all_documents(&self, db: &str, query: Option<&Query>) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db, "_all_docs"], query))
    }

    pub async fn get_all_documents(&self, db: &str, query: Option<&Query>) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_all_documents(db, query), tables::ALL_DOCS).await
    }

    /// POST to the database when `id` is `None` (server assigns the id),
    /// PUT to the document URL otherwise.
    pub fn build_create_document(
        &self,
        db: &str,
        doc: impl Into<Payload>,
        id: Option<&str>,
    ) -> Result<HttpRequest, CouchError> {
        let request = match id {
            Some(id) => HttpRequest::new(HttpMethod::Put, self.url(&[db, id], None)),
            None => HttpRequest::new(HttpMethod::Post, self.url(&[db], None)),
        };
        request.with_payload(doc.into())
    }

    /// Create a document, or update it when `doc` carries the current `_rev`.
    pub async fn create_document(
        &self,
        db: &str,
        doc: impl Into<Payload>,
        id: Option<&str>,
    ) -> Result<Envelope, CouchError> {
        let statuses = if id.is_some() { tables::PUT_DOCUMENT } else { tables::POST_DOCUMENT };
        self.execute(self.build_create_document(db, doc, id)?, statuses).await
    }

    pub fn build_get_document(&self, db: &str, id: &str, query: Option<&Query>) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db, id], query))
    }

    pub async fn get_document(&self, db: &str, id: &str, query: Option<&Query>) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_document(db, id, query), tables::GET_DOCUMENT).await
    }

    pub fn build_get_document_head(&self, db: &str, id: &str, query: Option<&Query>) -> HttpRequest {
        HttpRequest::new(HttpMethod::Head, self.url(&[db, id], query))
    }

    /// The current revision is in the `etag` header.
    pub async fn get_document_head(&self, db: &str, id: &str, query: Option<&Query>) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_document_head(db, id, query), tables::GET_DOCUMENT).await
    }

    pub fn build_delete_document(&self, db: &str, id: &str, rev: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&[db, id], Some(&rev_query(rev))))
    }

    pub async fn delete_document(&self, db: &str, id: &str, rev: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_delete_document(db, id, rev), tables::DELETE_DOCUMENT).await
    }

    pub fn build_copy_document(&self, db: &str, id: &str, new_id: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Copy, self.url(&[db, id], None))
            .with_header("destination", encode_segment(new_id))
    }

    pub async fn copy_document(&self, db: &str, id: &str, new_id: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_copy_document(db, id, new_id), tables::COPY_DOCUMENT).await
    }

    /// Mango query; `query` is the `_find` request body (`selector`, `fields`,
    /// `sort`, `limit`, ...).
    pub fn build_find_documents(&self, db: &str, query: impl Into<Payload>) -> Result<HttpRequest, CouchError> {
        HttpRequest::new(HttpMethod::Post, self.url(&[db, "_find"], None)).with_payload(query.into())
    }

    pub async fn find_documents(&self, db: &str, query: impl Into<Payload>) -> Result<Envelope, CouchError> {
        self.execute(self.build_find_documents(db, query)?, tables::FIND).await
    }

    /// `options` (e.g. `{"new_edits": false}`) are merged into the body next
    /// to `docs`.
    pub fn build_create_bulk_documents(
        &self,
        db: &str,
        docs: Vec<Value>,
        options: Option<Value>,
    ) -> Result<HttpRequest, CouchError> {
        let mut body = match options {
            None => Map::new(),
            Some(Value::Object(options)) => options,
            Some(other) => {
                return Err(CouchError::InvalidPayload(format!(
                    "bulk options must be a JSON object, got {other}"
                )))
            }
        };
        body.insert("docs".to_string(), Value::Array(docs));
        HttpRequest::new(HttpMethod::Post, self.url(&[db, "_bulk_docs"], None))
            .with_payload(Payload::Json(Value::Object(body)))
    }

    pub async fn create_bulk_documents(
        &self,
        db: &str,
        docs: Vec<Value>,
        options: Option<Value>,
    ) -> Result<Envelope, CouchError> {
        self.execute(self.build_create_bulk_documents(db, docs, options)?, tables::BULK_DOCS)
            .await
    }

    // -----------------------------------------------------------------------
    // Design documents and views
    // -----------------------------------------------------------------------

    pub fn build_create_design_document(
        &self,
        db: &str,
        doc: impl Into<Payload>,
        id: &str,
    ) -> Result<HttpRequest, CouchError> {
        HttpRequest::new(HttpMethod::Put, self.url(&[db, "_design", design_id(id)], None))
            .with_payload(doc.into())
    }

    pub async fn create_design_document(
        &self,
        db: &str,
        doc: impl Into<Payload>,
        id: &str,
    ) -> Result<Envelope, CouchError> {
        self.execute(self.build_create_design_document(db, doc, id)?, tables::PUT_DOCUMENT)
            .await
    }

    pub fn build_get_design_document(&self, db: &str, id: &str, query: Option<&Query>) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db, "_design", design_id(id)], query))
    }

    pub async fn get_design_document(&self, db: &str, id: &str, query: Option<&Query>) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_design_document(db, id, query), tables::GET_DOCUMENT)
            .await
    }

    pub fn build_get_design_document_info(&self, db: &str, id: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db, "_design", design_id(id), "_info"], None))
    }

    pub async fn get_design_document_info(&self, db: &str, id: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_design_document_info(db, id), tables::DESIGN_INFO)
            .await
    }

    pub fn build_delete_design_document(&self, db: &str, id: &str, rev: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Delete,
            self.url(&[db, "_design", design_id(id)], Some(&rev_query(rev))),
        )
    }

    pub async fn delete_design_document(&self, db: &str, id: &str, rev: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_delete_design_document(db, id, rev), tables::DELETE_DOCUMENT)
            .await
    }

    pub fn build_get_view(&self, db: &str, ddoc: &str, view: &str, query: Option<&Query>) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            self.url(&[db, "_design", design_id(ddoc), "_view", view], query),
        )
    }

    pub async fn get_view(
        &self,
        db: &str,
        ddoc: &str,
        view: &str,
        query: Option<&Query>,
    ) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_view(db, ddoc, view, query), tables::VIEW).await
    }

    // -----------------------------------------------------------------------
    // Mango indexes
    // -----------------------------------------------------------------------

    pub fn build_create_index(&self, db: &str, index: impl Into<Payload>) -> Result<HttpRequest, CouchError> {
        HttpRequest::new(HttpMethod::Post, self.url(&[db, "_index"], None)).with_payload(index.into())
    }

    pub async fn create_index(&self, db: &str, index: impl Into<Payload>) -> Result<Envelope, CouchError> {
        self.execute(self.build_create_index(db, index)?, tables::CREATE_INDEX).await
    }

    pub fn build_get_indexes(&self, db: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&[db, "_index"], None))
    }

    pub async fn get_indexes(&self, db: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_indexes(db), tables::GET_INDEXES).await
    }

    pub fn build_delete_index(&self, db: &str, ddoc: &str, name: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Delete,
            self.url(&[db, "_index", design_id(ddoc), "json", name], None),
        )
    }

    pub async fn delete_index(&self, db: &str, ddoc: &str, name: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_delete_index(db, ddoc, name), tables::DELETE_INDEX).await
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    pub fn build_add_attachment(
        &self,
        db: &str,
        doc: &str,
        name: &str,
        attachment: Payload,
        rev: &str,
    ) -> Result<HttpRequest, CouchError> {
        HttpRequest::new(HttpMethod::Put, self.url(&[db, doc, name], Some(&rev_query(rev))))
            .with_payload(attachment)
    }

    /// Upload an attachment. A `Payload::Stream` is sent chunked without being
    /// buffered.
    pub async fn add_attachment(
        &self,
        db: &str,
        doc: &str,
        name: &str,
        attachment: Payload,
        rev: &str,
    ) -> Result<Envelope, CouchError> {
        self.execute(self.build_add_attachment(db, doc, name, attachment, rev)?, tables::PUT_ATTACHMENT)
            .await
    }

    pub fn build_get_attachment(&self, db: &str, doc: &str, name: &str, rev: Option<&str>) -> HttpRequest {
        let query = rev.map(rev_query);
        HttpRequest::new(HttpMethod::Get, self.url(&[db, doc, name], query.as_ref()))
    }

    /// Stream an attachment into `sink`. The envelope's `data` is `null`; the
    /// content type is in its headers.
    pub async fn get_attachment<W>(
        &self,
        db: &str,
        doc: &str,
        name: &str,
        sink: &mut W,
        rev: Option<&str>,
    ) -> Result<Envelope, CouchError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let timeout = self.request_timeout();
        let request = self.build_get_attachment(db, doc, name, rev);
        executor::execute_to_sink(self.transport.as_ref(), request, tables::GET_ATTACHMENT, timeout, sink)
            .await
    }

    pub fn build_get_attachment_head(&self, db: &str, doc: &str, name: &str, rev: Option<&str>) -> HttpRequest {
        let query = rev.map(rev_query);
        HttpRequest::new(HttpMethod::Head, self.url(&[db, doc, name], query.as_ref()))
    }

    pub async fn get_attachment_head(
        &self,
        db: &str,
        doc: &str,
        name: &str,
        rev: Option<&str>,
    ) -> Result<Envelope, CouchError> {
        self.execute(self.build_get_attachment_head(db, doc, name, rev), tables::GET_ATTACHMENT)
            .await
    }

    pub fn build_delete_attachment(&self, db: &str, doc: &str, name: &str, rev: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&[db, doc, name], Some(&rev_query(rev))))
    }

    pub async fn delete_attachment(&self, db: &str, doc: &str, name: &str, rev: &str) -> Result<Envelope, CouchError> {
        self.execute(self.build_delete_attachment(db, doc, name, rev), tables::DELETE_ATTACHMENT)
            .await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &redact(&self.base_url))
            .field("request_timeout", &self.request_timeout())
            .finish_non_exhaustive()
    }
}

fn rev_query(rev: &str) -> Query {
    Query::new().param("rev", rev)
}

/// Design document ids are accepted with or without the `_design/` prefix.
fn design_id(id: &str) -> &str {
    id.strip_prefix("_design/").unwrap_or(id)
}
