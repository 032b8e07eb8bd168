//! Free functions taking the server URL on every call.
//!
//! Each function builds a throwaway [`Client`] with default settings and
//! forwards to the method of the same name, so the wire request is identical.
//! A malformed `base_url` settles as `CouchError::BadTarget` instead of a
//! configuration error.

#![allow(deprecated)]

use serde_json::Value;
use tokio::io::AsyncWrite;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::CouchError;
use crate::payload::Payload;
use crate::query::Query;

fn client(base_url: &str) -> Result<Client, CouchError> {
    Client::new(ClientConfig::new(base_url)).map_err(|e| match e {
        CouchError::Config(reason) => CouchError::BadTarget(reason),
        other => other,
    })
}

macro_rules! forward {
    ($( $(#[$meta:meta])* fn $name:ident($($arg:ident: $ty:ty),*); )*) => {
        $(
            $(#[$meta])*
            #[deprecated(note = "build a `Client` once and call its methods")]
            pub async fn $name(base_url: &str, $($arg: $ty),*) -> Result<Envelope, CouchError> {
                client(base_url)?.$name($($arg),*).await
            }
        )*
    };
}

forward! {
    fn get_info();
    fn list_databases();
    fn get_uuids(count: u32);
    fn create_database(db: &str);
    fn get_database(db: &str);
    fn get_database_head(db: &str);
    fn delete_database(db: &str);
    fn get_all_documents(db: &str, query: Option<&Query>);
    fn create_document(db: &str, doc: Value, id: Option<&str>);
    fn get_document(db: &str, id: &str, query: Option<&Query>);
    fn get_document_head(db: &str, id: &str, query: Option<&Query>);
    fn delete_document(db: &str, id: &str, rev: &str);
    fn copy_document(db: &str, id: &str, new_id: &str);
    fn find_documents(db: &str, query: Value);
    fn create_bulk_documents(db: &str, docs: Vec<Value>, options: Option<Value>);
    fn create_design_document(db: &str, doc: Value, id: &str);
    fn get_design_document(db: &str, id: &str, query: Option<&Query>);
    fn get_design_document_info(db: &str, id: &str);
    fn delete_design_document(db: &str, id: &str, rev: &str);
    fn get_view(db: &str, ddoc: &str, view: &str, query: Option<&Query>);
    fn create_index(db: &str, index: Value);
    fn get_indexes(db: &str);
    fn delete_index(db: &str, ddoc: &str, name: &str);
    fn add_attachment(db: &str, doc: &str, name: &str, attachment: Payload, rev: &str);
    fn get_attachment_head(db: &str, doc: &str, name: &str, rev: Option<&str>);
    fn delete_attachment(db: &str, doc: &str, name: &str, rev: &str);
}

#[deprecated(note = "build a `Client` once and call its methods")]
pub async fn get_attachment<W>(
    base_url: &str,
    db: &str,
    doc: &str,
    name: &str,
    sink: &mut W,
    rev: Option<&str>,
) -> Result<Envelope, CouchError>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    client(base_url)?.get_attachment(db, doc, name, sink, rev).await
}
