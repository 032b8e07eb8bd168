//! End-to-end tests against the mock CouchDB server.
//!
//! # Design
//! Each test starts its own mock server on a random port, so databases never
//! leak between tests, then drives the real `reqwest` transport through the
//! public `Client` API.

use std::time::Duration;

use bytes::Bytes;
use couch_client::{Client, ClientConfig, CouchError, Payload, Query};
use serde_json::{json, Value};

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_couch::run(listener));
    format!("http://{addr}")
}

async fn client() -> Client {
    Client::new(ClientConfig::new(start_server().await)).unwrap()
}

fn rev_of(data: &Value) -> String {
    data["rev"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn document_lifecycle() {
    let client = client().await;

    let created = client.create_database("testdb_x").await.unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.message, "Created - Database created successfully");
    assert_eq!(created.data, json!({"ok": true}));
    assert!(created.duration.is_some());

    let saved = client
        .create_document("testdb_x", json!({"name": "January", "number": 1}), None)
        .await
        .unwrap();
    assert_eq!(saved.status, 201);
    assert_eq!(saved.message, "Created - Document created and stored on disk");
    let id = saved.data["id"].as_str().unwrap().to_string();
    let rev = rev_of(&saved.data);

    let fetched = client.get_document("testdb_x", &id, None).await.unwrap();
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.data["name"], "January");
    assert_eq!(fetched.data["number"], 1);
    assert_eq!(fetched.data["_rev"], rev.as_str());

    let deleted = client.delete_document("testdb_x", &id, &rev).await.unwrap();
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.data["ok"], true);

    let gone = client.get_document("testdb_x", &id, None).await.unwrap_err();
    assert!(gone.is_not_found());

    let dropped = client.delete_database("testdb_x").await.unwrap();
    assert_eq!(dropped.message, "OK - Database removed successfully");

    let listed = client.list_databases().await.unwrap();
    assert_eq!(listed.data, json!([]));
}

#[tokio::test]
async fn server_endpoints() {
    let client = client().await;

    let info = client.get_info().await.unwrap();
    assert_eq!(info.data["couchdb"], "Welcome");
    assert_eq!(info.header("Content-Type"), Some("application/json"));

    let uuids = client.get_uuids(4).await.unwrap();
    assert_eq!(uuids.data["uuids"].as_array().unwrap().len(), 4);

    let err = client.get_uuids(5000).await.unwrap_err();
    assert_eq!(err.status(), 400);
    assert_eq!(
        err.response().unwrap().message,
        "Bad Request - Requested more UUIDs than is allowed to retrieve"
    );
}

#[tokio::test]
async fn database_errors_carry_the_server_envelope() {
    let client = client().await;

    let err = client.get_database("missing").await.unwrap_err();
    let CouchError::Status(envelope) = &err else {
        panic!("expected a status error, got {err:?}");
    };
    assert_eq!(envelope.status, 404);
    assert_eq!(envelope.message, "Not Found - Requested database not found");
    assert_eq!(envelope.data["error"], "not_found");
    assert_eq!(err.envelope(), **envelope);

    client.create_database("twice").await.unwrap();
    let err = client.create_database("twice").await.unwrap_err();
    assert_eq!(err.status(), 412);
    assert_eq!(err.response().unwrap().message, "Precondition Failed - Database already exists");

    let err = client.create_database("Not_Valid").await.unwrap_err();
    assert_eq!(err.status(), 400);

    let head = client.get_database_head("twice").await.unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(head.data, json!({}));
}

#[tokio::test]
async fn update_conflict_is_409() {
    let client = client().await;
    client.create_database("albums").await.unwrap();

    client.create_document("albums", json!({"title": "Blue"}), Some("blue")).await.unwrap();
    let err = client
        .create_document("albums", json!({"title": "Blue again"}), Some("blue"))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(err.response().unwrap().data["error"], "conflict");
}

#[tokio::test]
async fn ids_with_reserved_characters_round_trip() {
    let client = client().await;
    client.create_database("albums").await.unwrap();

    let saved = client
        .create_document("albums", json!({"kind": "nested"}), Some("a/b c"))
        .await
        .unwrap();
    assert_eq!(saved.data["id"], "a/b c");

    let fetched = client.get_document("albums", "a/b c", None).await.unwrap();
    assert_eq!(fetched.data["_id"], "a/b c");
    assert_eq!(fetched.data["kind"], "nested");
}

#[tokio::test]
async fn head_reports_the_revision_in_etag() {
    let client = client().await;
    client.create_database("albums").await.unwrap();
    let saved = client.create_document("albums", json!({}), Some("doc")).await.unwrap();
    let rev = rev_of(&saved.data);

    let head = client.get_document_head("albums", "doc", None).await.unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(head.header("etag"), Some(format!("\"{rev}\"").as_str()));
    assert_eq!(head.data, json!({}));
}

#[tokio::test]
async fn all_docs_and_copy() {
    let client = client().await;
    client.create_database("albums").await.unwrap();
    for id in ["a", "b", "c"] {
        client.create_document("albums", json!({"id": id}), Some(id)).await.unwrap();
    }

    let copied = client.copy_document("albums", "a", "a/copy").await.unwrap();
    assert_eq!(copied.status, 201);
    assert_eq!(copied.message, "Created - Document successfully created");
    assert_eq!(copied.data["id"], "a/copy");

    let query = Query::new().param("startkey", "a/").param("include_docs", true);
    let rows = client.get_all_documents("albums", Some(&query)).await.unwrap();
    let ids: Vec<&str> = rows.data["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a/copy", "b", "c"]);
    assert_eq!(rows.data["rows"][0]["doc"]["id"], "a");

    let query = Query::new().param("keys", json!(["c", "zzz"]));
    let rows = client.get_all_documents("albums", Some(&query)).await.unwrap();
    assert_eq!(rows.data["rows"][1]["error"], "not_found");
}

#[tokio::test]
async fn bulk_docs_and_find() {
    let client = client().await;
    client.create_database("albums").await.unwrap();

    let docs = vec![
        json!({"_id": "one", "year": 1999}),
        json!({"_id": "two", "year": 2005}),
        json!({"_id": "three", "year": 2011}),
    ];
    let bulk = client.create_bulk_documents("albums", docs, None).await.unwrap();
    assert_eq!(bulk.status, 201);
    assert_eq!(bulk.data.as_array().unwrap().len(), 3);

    let found = client
        .find_documents(
            "albums",
            json!({"selector": {"year": {"$gte": 2005}}, "fields": ["_id"]}),
        )
        .await
        .unwrap();
    assert_eq!(found.data["docs"], json!([{"_id": "three"}, {"_id": "two"}]));

    let err = client.find_documents("albums", json!({"limit": 1})).await.unwrap_err();
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn index_lifecycle() {
    let client = client().await;
    client.create_database("albums").await.unwrap();

    let created = client
        .create_index(
            "albums",
            json!({"index": {"fields": ["year"]}, "ddoc": "by-year", "name": "year", "type": "json"}),
        )
        .await
        .unwrap();
    assert_eq!(created.data["result"], "created");
    assert_eq!(created.data["id"], "_design/by-year");

    let listed = client.get_indexes("albums").await.unwrap();
    assert_eq!(listed.data["total_rows"], 2);

    let removed = client.delete_index("albums", "_design/by-year", "year").await.unwrap();
    assert_eq!(removed.data["ok"], true);

    let err = client.delete_index("albums", "by-year", "year").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn design_documents_and_views() {
    let client = client().await;
    client.create_database("albums").await.unwrap();
    let ddoc = json!({
        "language": "javascript",
        "views": {"all": {"map": "function (doc) { emit(doc._id, null) }"}},
    });
    let saved = client.create_design_document("albums", ddoc, "lists").await.unwrap();
    assert_eq!(saved.data["id"], "_design/lists");
    client.create_document("albums", json!({"n": 1}), Some("x")).await.unwrap();
    client.create_document("albums", json!({"n": 2}), Some("y")).await.unwrap();

    let fetched = client.get_design_document("albums", "_design/lists", None).await.unwrap();
    assert_eq!(fetched.data["language"], "javascript");

    let info = client.get_design_document_info("albums", "lists").await.unwrap();
    assert_eq!(info.data["name"], "lists");

    let query = Query::new().param("key", "y").param("include_docs", true);
    let view = client.get_view("albums", "lists", "all", Some(&query)).await.unwrap();
    assert_eq!(view.data["total_rows"], 2);
    assert_eq!(view.data["rows"][0]["doc"]["n"], 2);

    let err = client.get_view("albums", "lists", "missing", None).await.unwrap_err();
    assert_eq!(
        err.response().unwrap().message,
        "Not Found - Specified database, design document or view is missed"
    );

    let removed = client
        .delete_design_document("albums", "lists", &rev_of(&saved.data))
        .await
        .unwrap();
    assert_eq!(removed.status, 200);
}

#[tokio::test]
async fn attachments_stream_both_ways() {
    let client = client().await;
    client.create_database("albums").await.unwrap();
    let saved = client.create_document("albums", json!({}), Some("cover")).await.unwrap();

    let chunks = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"hello, ")),
        Ok(Bytes::from_static(b"world")),
    ]);
    let uploaded = client
        .add_attachment(
            "albums",
            "cover",
            "front.txt",
            Payload::stream(chunks, "text/plain"),
            &rev_of(&saved.data),
        )
        .await
        .unwrap();
    assert_eq!(uploaded.status, 201);
    let rev = rev_of(&uploaded.data);
    assert!(rev.starts_with("2-"));

    let mut sink = Vec::new();
    let downloaded = client
        .get_attachment("albums", "cover", "front.txt", &mut sink, None)
        .await
        .unwrap();
    assert_eq!(sink, b"hello, world");
    assert_eq!(downloaded.data, Value::Null);
    assert_eq!(downloaded.message, "OK - Attachment exists");
    assert_eq!(downloaded.header("content-type"), Some("text/plain"));

    let head = client
        .get_attachment_head("albums", "cover", "front.txt", Some(&rev))
        .await
        .unwrap();
    assert_eq!(head.header("content-length"), Some("12"));

    let removed = client
        .delete_attachment("albums", "cover", "front.txt", &rev)
        .await
        .unwrap();
    assert_eq!(removed.status, 200);

    let mut sink = Vec::new();
    let err = client
        .get_attachment("albums", "cover", "front.txt", &mut sink, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!sink.is_empty(), "error body is still copied into the sink");
}

#[tokio::test]
async fn buffered_attachment_upload() {
    let client = client().await;
    client.create_database("albums").await.unwrap();
    let saved = client.create_document("albums", json!({}), Some("notes")).await.unwrap();

    client
        .add_attachment(
            "albums",
            "notes",
            "a.bin",
            Payload::buffer(vec![0u8, 1, 2, 3], "application/octet-stream"),
            &rev_of(&saved.data),
        )
        .await
        .unwrap();

    let mut sink = Vec::new();
    client
        .get_attachment("albums", "notes", "a.bin", &mut sink, None)
        .await
        .unwrap();
    assert_eq!(sink, [0u8, 1, 2, 3]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().route(
        "/{db}",
        axum::routing::get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "{}"
        }),
    );
    tokio::spawn(async move { axum::serve(listener, app).await });

    let config = ClientConfig::new(format!("http://{addr}")).with_request_timeout(Duration::from_millis(20));
    let client = Client::new(config).unwrap();

    let err = client.get_database("slow").await.unwrap_err();
    assert!(err.is_timeout());
    let envelope = err.envelope();
    assert_eq!(envelope.status, 500);
    assert_eq!(envelope.data["reason"], "request timed out");

    client.set_request_timeout(Duration::from_secs(5));
    let ok = client.get_database("slow").await.unwrap();
    assert_eq!(ok.status, 200);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(ClientConfig::new(format!("http://{addr}"))).unwrap();
    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, CouchError::Transport(_)));
    assert_eq!(err.envelope().status, 500);
}

#[tokio::test]
#[allow(deprecated)]
async fn free_functions_match_the_client() {
    use couch_client::compat;

    let base_url = start_server().await;
    let client = Client::new(ClientConfig::new(base_url.as_str())).unwrap();

    let created = compat::create_database(&base_url, "testdb_compat").await.unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.message, "Created - Database created successfully");

    let saved = compat::create_document(&base_url, "testdb_compat", json!({"name": "January"}), Some("jan"))
        .await
        .unwrap();
    assert_eq!(saved.data["id"], "jan");

    let through_shim = compat::get_document(&base_url, "testdb_compat", "jan", None).await.unwrap();
    let through_client = client.get_document("testdb_compat", "jan", None).await.unwrap();
    assert_eq!(through_shim.status, through_client.status);
    assert_eq!(through_shim.message, through_client.message);
    assert_eq!(through_shim.data, through_client.data);
    assert_eq!(through_shim.header("etag"), through_client.header("etag"));

    let shim_err = compat::get_database(&base_url, "missing").await.unwrap_err();
    let client_err = client.get_database("missing").await.unwrap_err();
    assert_eq!(shim_err.status(), 404);
    assert_eq!(shim_err.response().unwrap().message, client_err.response().unwrap().message);
    assert_eq!(shim_err.response().unwrap().data, client_err.response().unwrap().data);
}
