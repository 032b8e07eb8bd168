//! In-memory CouchDB stand-in for tests.
//!
//! Serves the subset of the CouchDB HTTP API the client talks to, with
//! CouchDB's status codes and `{"error", "reason"}` bodies. Views do not run
//! map functions: every view emits one row per non-design document, keyed by
//! document id.

pub mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

use crate::store::{
    is_valid_db_name, matches_selector, new_id, project, Attachment, Database, Index, RowQuery, StoredDoc,
    WriteError,
};

pub type Couch = Arc<RwLock<BTreeMap<String, Database>>>;

type Params = Query<HashMap<String, String>>;

pub fn app() -> Router {
    let couch: Couch = Arc::default();
    Router::new()
        .route("/", get(server_info))
        .route("/_all_dbs", get(all_dbs))
        .route("/_uuids", get(uuids))
        .route("/{db}", any(database))
        .route("/{db}/_all_docs", get(all_docs))
        .route("/{db}/_bulk_docs", post(bulk_docs))
        .route("/{db}/_find", post(find))
        .route("/{db}/_index", get(list_indexes).post(create_index))
        .route("/{db}/_index/{ddoc}/json/{name}", delete(delete_index))
        .route("/{db}/_design/{ddoc}", any(design_document))
        .route("/{db}/_design/{ddoc}/_info", get(design_info))
        .route("/{db}/_design/{ddoc}/_view/{view}", get(view))
        .route("/{db}/{doc}", any(document))
        .route("/{db}/{doc}/{att}", any(attachment))
        .with_state(couch)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({"error": error, "reason": reason}))).into_response()
}

fn no_db() -> Response {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}

fn conflict() -> Response {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

fn saved(status: StatusCode, id: &str, rev: &str) -> Response {
    (
        status,
        [(header::ETAG, format!("\"{rev}\""))],
        Json(json!({"ok": true, "id": id, "rev": rev})),
    )
        .into_response()
}

fn require_json(headers: &HeaderMap) -> Result<(), Response> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        Ok(())
    } else {
        Err(error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "bad_content_type",
            "Content-Type must be application/json",
        ))
    }
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, Response> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(error(StatusCode::BAD_REQUEST, "bad_request", "Request body must be a JSON object")),
        Err(_) => Err(error(StatusCode::BAD_REQUEST, "bad_request", "invalid UTF-8 JSON")),
    }
}

fn header_rev(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_string())
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

async fn server_info() -> Json<Value> {
    Json(json!({
        "couchdb": "Welcome",
        "version": "3.3.3",
        "vendor": {"name": "mock-couch"},
        "features": [],
    }))
}

async fn all_dbs(State(couch): State<Couch>) -> Json<Vec<String>> {
    Json(couch.read().await.keys().cloned().collect())
}

#[derive(Deserialize)]
struct UuidsParams {
    #[serde(default = "one")]
    count: usize,
}

fn one() -> usize {
    1
}

async fn uuids(Query(params): Query<UuidsParams>) -> Response {
    if params.count > 1000 {
        return error(StatusCode::BAD_REQUEST, "bad_request", "count parameter too large");
    }
    let uuids: Vec<String> = (0..params.count).map(|_| new_id()).collect();
    Json(json!({ "uuids": uuids })).into_response()
}

// ---------------------------------------------------------------------------
// Databases
// ---------------------------------------------------------------------------

async fn database(
    State(couch): State<Couch>,
    Path(db): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match method {
        Method::PUT => {
            if !is_valid_db_name(&db) {
                return error(
                    StatusCode::BAD_REQUEST,
                    "illegal_database_name",
                    &format!("Name: '{db}'. Only lowercase characters (a-z), digits (0-9), and any of the characters _, $, (, ), +, -, and / are allowed. Must begin with a letter."),
                );
            }
            let mut dbs = couch.write().await;
            if dbs.contains_key(&db) {
                return error(
                    StatusCode::PRECONDITION_FAILED,
                    "file_exists",
                    "The database could not be created, the file already exists.",
                );
            }
            dbs.insert(db.clone(), Database::default());
            debug!(%db, "database created");
            (StatusCode::CREATED, Json(json!({"ok": true}))).into_response()
        }
        Method::GET | Method::HEAD => match couch.read().await.get(&db) {
            Some(database) => Json(database.info(&db)).into_response(),
            None => no_db(),
        },
        Method::DELETE => match couch.write().await.remove(&db) {
            Some(_) => {
                debug!(%db, "database deleted");
                Json(json!({"ok": true})).into_response()
            }
            None => no_db(),
        },
        Method::POST => {
            if let Err(response) = require_json(&headers) {
                return response;
            }
            let doc = match parse_object(&body) {
                Ok(doc) => doc,
                Err(response) => return response,
            };
            let id = doc
                .get("_id")
                .and_then(Value::as_str)
                .map_or_else(new_id, str::to_string);
            let mut dbs = couch.write().await;
            let Some(database) = dbs.get_mut(&db) else {
                return no_db();
            };
            match database.write(&id, doc, None) {
                Ok(rev) => saved(StatusCode::CREATED, &id, &rev),
                Err(WriteError::Conflict) => conflict(),
            }
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "Only DELETE,GET,HEAD,POST,PUT allowed"),
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

async fn document(
    State(couch): State<Couch>,
    Path((db, id)): Path<(String, String)>,
    method: Method,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    document_request(&couch, &db, &id, method, &params, &headers, &body).await
}

async fn design_document(
    State(couch): State<Couch>,
    Path((db, ddoc)): Path<(String, String)>,
    method: Method,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = format!("_design/{ddoc}");
    document_request(&couch, &db, &id, method, &params, &headers, &body).await
}

async fn document_request(
    couch: &Couch,
    db: &str,
    id: &str,
    method: Method,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    match method {
        Method::GET | Method::HEAD => {
            let dbs = couch.read().await;
            let Some(database) = dbs.get(db) else {
                return no_db();
            };
            match database.docs.get(id) {
                None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
                Some(doc) if doc.deleted => error(StatusCode::NOT_FOUND, "not_found", "deleted"),
                Some(doc) if params.get("rev").is_some_and(|rev| *rev != doc.rev) => {
                    error(StatusCode::NOT_FOUND, "not_found", "missing")
                }
                Some(doc) => (
                    [(header::ETAG, format!("\"{}\"", doc.rev))],
                    Json(doc.render(id)),
                )
                    .into_response(),
            }
        }
        Method::PUT => {
            if let Err(response) = require_json(headers) {
                return response;
            }
            let doc = match parse_object(body) {
                Ok(doc) => doc,
                Err(response) => return response,
            };
            let rev = params.get("rev").cloned().or_else(|| header_rev(headers));
            let mut dbs = couch.write().await;
            let Some(database) = dbs.get_mut(db) else {
                return no_db();
            };
            match database.write(id, doc, rev) {
                Ok(rev) => saved(StatusCode::CREATED, id, &rev),
                Err(WriteError::Conflict) => conflict(),
            }
        }
        Method::DELETE => {
            let rev = params.get("rev").cloned().or_else(|| header_rev(headers));
            let mut dbs = couch.write().await;
            let Some(database) = dbs.get_mut(db) else {
                return no_db();
            };
            if database.live(id).is_none() {
                return error(StatusCode::NOT_FOUND, "not_found", "missing");
            }
            let mut tombstone = Map::new();
            tombstone.insert("_deleted".to_string(), Value::Bool(true));
            match database.write(id, tombstone, rev) {
                Ok(rev) => saved(StatusCode::OK, id, &rev),
                Err(WriteError::Conflict) => conflict(),
            }
        }
        ref m if m.as_str() == "COPY" => copy_document(couch, db, id, headers).await,
        _ => error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Only DELETE,GET,HEAD,PUT,COPY allowed",
        ),
    }
}

async fn copy_document(couch: &Couch, db: &str, id: &str, headers: &HeaderMap) -> Response {
    let Some(destination) = headers.get("destination").and_then(|v| v.to_str().ok()) else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Destination header is mandatory for COPY.");
    };
    let (target, target_rev) = match destination.split_once("?rev=") {
        Some((target, rev)) => (target, Some(rev.to_string())),
        None => (destination, None),
    };
    let target = match urlencoding::decode(target) {
        Ok(target) => target.into_owned(),
        Err(_) => return error(StatusCode::BAD_REQUEST, "bad_request", "invalid Destination header"),
    };

    let mut dbs = couch.write().await;
    let Some(database) = dbs.get_mut(db) else {
        return no_db();
    };
    let Some(source) = database.live(id).cloned() else {
        return error(StatusCode::NOT_FOUND, "not_found", "missing");
    };
    match database.write(&target, source.body, target_rev) {
        Ok(rev) => {
            if let Some(copy) = database.docs.get_mut(&target) {
                copy.attachments = source.attachments;
            }
            saved(StatusCode::CREATED, &target, &rev)
        }
        Err(WriteError::Conflict) => conflict(),
    }
}

async fn all_docs(State(couch): State<Couch>, Path(db): Path<String>, Query(params): Params) -> Response {
    let query = match RowQuery::from_params(&params) {
        Ok(query) => query,
        Err(reason) => return error(StatusCode::BAD_REQUEST, "bad_request", &reason),
    };
    let dbs = couch.read().await;
    let Some(database) = dbs.get(&db) else {
        return no_db();
    };
    let rows: Vec<Value> = query
        .select(database.live_docs())
        .into_iter()
        .map(|(id, doc)| match doc {
            Some(doc) => {
                let mut row = json!({"id": id, "key": id, "value": {"rev": doc.rev}});
                if query.include_docs {
                    row["doc"] = doc.render(&id);
                }
                row
            }
            None => json!({"key": id, "error": "not_found"}),
        })
        .collect();
    Json(json!({
        "total_rows": database.doc_count(),
        "offset": query.skip,
        "rows": rows,
    }))
    .into_response()
}

async fn bulk_docs(State(couch): State<Couch>, Path(db): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = require_json(&headers) {
        return response;
    }
    let request = match parse_object(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(Value::Array(docs)) = request.get("docs") else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "POST body must include `docs` parameter.");
    };

    let mut dbs = couch.write().await;
    let Some(database) = dbs.get_mut(&db) else {
        return no_db();
    };
    let results: Vec<Value> = docs
        .iter()
        .map(|doc| {
            let Value::Object(doc) = doc else {
                return json!({"error": "bad_request", "reason": "Document must be a JSON object"});
            };
            let id = doc
                .get("_id")
                .and_then(Value::as_str)
                .map_or_else(new_id, str::to_string);
            match database.write(&id, doc.clone(), None) {
                Ok(rev) => json!({"ok": true, "id": id, "rev": rev}),
                Err(WriteError::Conflict) => {
                    json!({"id": id, "error": "conflict", "reason": "Document update conflict."})
                }
            }
        })
        .collect();
    (StatusCode::CREATED, Json(Value::Array(results))).into_response()
}

async fn find(State(couch): State<Couch>, Path(db): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = require_json(&headers) {
        return response;
    }
    let request = match parse_object(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(Value::Object(selector)) = request.get("selector") else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Missing required key: selector");
    };
    let limit = request.get("limit").and_then(Value::as_u64).unwrap_or(25) as usize;
    let skip = request.get("skip").and_then(Value::as_u64).unwrap_or(0) as usize;
    let fields = request.get("fields").and_then(Value::as_array);

    let dbs = couch.read().await;
    let Some(database) = dbs.get(&db) else {
        return no_db();
    };
    let docs: Vec<Value> = database
        .live_docs()
        .filter(|(id, _)| !id.starts_with("_design/"))
        .map(|(id, doc)| doc.render(id))
        .filter(|doc| matches_selector(doc, selector))
        .skip(skip)
        .take(limit)
        .map(|doc| project(doc, fields))
        .collect();
    Json(json!({"docs": docs, "bookmark": "nil"})).into_response()
}

// ---------------------------------------------------------------------------
// Mango indexes
// ---------------------------------------------------------------------------

async fn create_index(State(couch): State<Couch>, Path(db): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = require_json(&headers) {
        return response;
    }
    let request = match parse_object(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(fields) = request.get("index").and_then(|index| index.get("fields")).filter(|f| f.is_array()) else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Missing required key: index");
    };
    let ddoc = match request.get("ddoc").and_then(Value::as_str) {
        Some(ddoc) if ddoc.starts_with("_design/") => ddoc.to_string(),
        Some(ddoc) => format!("_design/{ddoc}"),
        None => format!("_design/{}", new_id()),
    };
    let name = request
        .get("name")
        .and_then(Value::as_str)
        .map_or_else(new_id, str::to_string);

    let mut dbs = couch.write().await;
    let Some(database) = dbs.get_mut(&db) else {
        return no_db();
    };
    let exists = database.indexes.iter().any(|index| index.ddoc == ddoc && index.name == name);
    if !exists {
        database.indexes.push(Index {
            ddoc: ddoc.clone(),
            name: name.clone(),
            fields: fields.clone(),
        });
    }
    let result = if exists { "exists" } else { "created" };
    Json(json!({"result": result, "id": ddoc, "name": name})).into_response()
}

async fn list_indexes(State(couch): State<Couch>, Path(db): Path<String>) -> Response {
    let dbs = couch.read().await;
    let Some(database) = dbs.get(&db) else {
        return no_db();
    };
    let mut indexes = vec![json!({
        "ddoc": null,
        "name": "_all_docs",
        "type": "special",
        "def": {"fields": [{"_id": "asc"}]},
    })];
    indexes.extend(database.indexes.iter().map(|index| {
        json!({
            "ddoc": index.ddoc,
            "name": index.name,
            "type": "json",
            "def": {"fields": index.fields},
        })
    }));
    Json(json!({"total_rows": indexes.len(), "indexes": indexes})).into_response()
}

async fn delete_index(
    State(couch): State<Couch>,
    Path((db, ddoc, name)): Path<(String, String, String)>,
) -> Response {
    let ddoc = format!("_design/{}", ddoc.strip_prefix("_design/").unwrap_or(&ddoc));
    let mut dbs = couch.write().await;
    let Some(database) = dbs.get_mut(&db) else {
        return no_db();
    };
    let before = database.indexes.len();
    database.indexes.retain(|index| !(index.ddoc == ddoc && index.name == name));
    if database.indexes.len() == before {
        return error(StatusCode::NOT_FOUND, "not_found", "Index not found");
    }
    Json(json!({"ok": true})).into_response()
}

// ---------------------------------------------------------------------------
// Design documents and views
// ---------------------------------------------------------------------------

async fn design_info(State(couch): State<Couch>, Path((db, ddoc)): Path<(String, String)>) -> Response {
    let dbs = couch.read().await;
    let Some(database) = dbs.get(&db) else {
        return no_db();
    };
    let Some(doc) = database.live(&format!("_design/{ddoc}")) else {
        return error(StatusCode::NOT_FOUND, "not_found", "missing");
    };
    let language = doc.body.get("language").and_then(Value::as_str).unwrap_or("javascript");
    Json(json!({
        "name": ddoc,
        "view_index": {
            "language": language,
            "signature": doc.rev,
            "sizes": {"active": 0, "external": 0, "file": 0},
            "update_seq": database.update_seq,
            "purge_seq": 0,
            "updater_running": false,
            "waiting_clients": 0,
            "waiting_commit": false,
        },
    }))
    .into_response()
}

async fn view(
    State(couch): State<Couch>,
    Path((db, ddoc, view)): Path<(String, String, String)>,
    Query(params): Params,
) -> Response {
    let query = match RowQuery::from_params(&params) {
        Ok(query) => query,
        Err(reason) => return error(StatusCode::BAD_REQUEST, "bad_request", &reason),
    };
    let dbs = couch.read().await;
    let Some(database) = dbs.get(&db) else {
        return no_db();
    };
    let Some(design) = database.live(&format!("_design/{ddoc}")) else {
        return error(StatusCode::NOT_FOUND, "not_found", "missing");
    };
    if design.body.get("views").and_then(|views| views.get(&view)).is_none() {
        return error(StatusCode::NOT_FOUND, "not_found", "missing_named_view");
    }

    let is_plain = |(id, _): &(&String, &StoredDoc)| !id.starts_with("_design/");
    let total_rows = database.live_docs().filter(is_plain).count();
    let rows: Vec<Value> = query
        .select(database.live_docs().filter(is_plain))
        .into_iter()
        .filter_map(|(id, doc)| {
            let doc = doc?;
            let mut row = json!({"id": id, "key": id, "value": null});
            if query.include_docs {
                row["doc"] = doc.render(&id);
            }
            Some(row)
        })
        .collect();
    Json(json!({"total_rows": total_rows, "offset": query.skip, "rows": rows})).into_response()
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

async fn attachment(
    State(couch): State<Couch>,
    Path((db, doc_id, name)): Path<(String, String, String)>,
    method: Method,
    Query(params): Params,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match method {
        Method::GET | Method::HEAD => {
            let dbs = couch.read().await;
            let Some(database) = dbs.get(&db) else {
                return no_db();
            };
            let Some(att) = database.live(&doc_id).and_then(|doc| doc.attachments.get(&name)) else {
                return error(StatusCode::NOT_FOUND, "not_found", "Document is missing attachment");
            };
            (
                [
                    (header::CONTENT_TYPE, att.content_type.clone()),
                    (header::CONTENT_LENGTH, att.data.len().to_string()),
                ],
                att.data.clone(),
            )
                .into_response()
        }
        Method::PUT => {
            let rev = params.get("rev").cloned().or_else(|| header_rev(&headers));
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let mut dbs = couch.write().await;
            let Some(database) = dbs.get_mut(&db) else {
                return no_db();
            };
            let current = database.live(&doc_id).map(|doc| doc.rev.clone());
            let rev = match current {
                Some(current) if rev.as_deref() == Some(current.as_str()) => database.touch(&doc_id),
                Some(_) => return conflict(),
                None => match database.write(&doc_id, Map::new(), rev) {
                    Ok(rev) => Some(rev),
                    Err(WriteError::Conflict) => return conflict(),
                },
            };
            if let Some(doc) = database.docs.get_mut(&doc_id) {
                doc.attachments.insert(
                    name,
                    Attachment {
                        content_type,
                        data: body,
                    },
                );
            }
            match rev {
                Some(rev) => saved(StatusCode::CREATED, &doc_id, &rev),
                None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
            }
        }
        Method::DELETE => {
            let rev = params.get("rev").cloned().or_else(|| header_rev(&headers));
            let mut dbs = couch.write().await;
            let Some(database) = dbs.get_mut(&db) else {
                return no_db();
            };
            let Some(doc) = database.live(&doc_id) else {
                return error(StatusCode::NOT_FOUND, "not_found", "missing");
            };
            if rev.as_deref() != Some(doc.rev.as_str()) {
                return conflict();
            }
            if !doc.attachments.contains_key(&name) {
                return error(StatusCode::NOT_FOUND, "not_found", "Document is missing attachment");
            }
            if let Some(doc) = database.docs.get_mut(&doc_id) {
                doc.attachments.remove(&name);
            }
            match database.touch(&doc_id) {
                Some(rev) => saved(StatusCode::OK, &doc_id, &rev),
                None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
            }
        }
        _ => error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Only DELETE,GET,HEAD,PUT allowed",
        ),
    }
}
