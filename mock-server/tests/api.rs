use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_couch::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder().method(method).uri(uri).body(String::new()).unwrap()
}

async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn with_db(name: &str) -> Router {
    let app = app();
    let resp = send(&app, empty_request("PUT", &format!("/{name}"))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    app
}

// --- server ---

#[tokio::test]
async fn server_info_welcomes() {
    let resp = send(&app(), empty_request("GET", "/")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let info = body_json(resp).await;
    assert_eq!(info["couchdb"], "Welcome");
}

#[tokio::test]
async fn uuids_honours_count() {
    let app = app();
    let resp = send(&app, empty_request("GET", "/_uuids?count=3")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["uuids"].as_array().unwrap().len(), 3);

    let resp = send(&app, empty_request("GET", "/_uuids?count=5000")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- databases ---

#[tokio::test]
async fn create_database_twice_returns_412() {
    let app = with_db("albums").await;

    let resp = send(&app, empty_request("PUT", "/albums")).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(body_json(resp).await["error"], "file_exists");

    let resp = send(&app, empty_request("GET", "/_all_dbs")).await;
    assert_eq!(body_json(resp).await, json!(["albums"]));
}

#[tokio::test]
async fn invalid_database_name_returns_400() {
    let resp = send(&app(), empty_request("PUT", "/Albums")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "illegal_database_name");
}

#[tokio::test]
async fn missing_database_returns_404() {
    let app = app();
    let resp = send(&app, empty_request("GET", "/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["reason"], "Database does not exist.");

    let resp = send(&app, empty_request("DELETE", "/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- documents ---

#[tokio::test]
async fn document_lifecycle() {
    let app = with_db("albums").await;

    let resp = send(&app, json_request("POST", "/albums", r#"{"name":"January","number":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    let rev = created["rev"].as_str().unwrap().to_string();
    assert!(rev.starts_with("1-"));

    let resp = send(&app, empty_request("GET", &format!("/albums/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(http::header::ETAG).unwrap().to_str().unwrap(),
        format!("\"{rev}\"")
    );
    let doc = body_json(resp).await;
    assert_eq!(doc["name"], "January");
    assert_eq!(doc["_rev"], rev.as_str());

    // stale write without a rev
    let resp = send(&app, json_request("PUT", &format!("/albums/{id}"), r#"{"name":"February"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &app,
        json_request("PUT", &format!("/albums/{id}?rev={rev}"), r#"{"name":"February"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let rev = body_json(resp).await["rev"].as_str().unwrap().to_string();
    assert!(rev.starts_with("2-"));

    let resp = send(&app, empty_request("DELETE", &format!("/albums/{id}?rev={rev}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["ok"], true);

    let resp = send(&app, empty_request("GET", &format!("/albums/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["reason"], "deleted");
}

#[tokio::test]
async fn write_without_json_content_type_returns_415() {
    let app = with_db("albums").await;
    let request = Request::builder()
        .method("PUT")
        .uri("/albums/doc")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(r#"{"a":1}"#.to_string())
        .unwrap();

    let resp = send(&app, request).await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn copy_duplicates_a_document() {
    let app = with_db("albums").await;
    send(&app, json_request("PUT", "/albums/source", r#"{"title":"Blue"}"#)).await;

    let request = Request::builder()
        .method("COPY")
        .uri("/albums/source")
        .header("Destination", "copy%2Fone")
        .body(String::new())
        .unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["id"], "copy/one");

    let resp = send(&app, empty_request("GET", "/albums/copy%2Fone")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["title"], "Blue");
}

#[tokio::test]
async fn all_docs_honours_key_range() {
    let app = with_db("albums").await;
    for id in ["a", "b", "c", "d"] {
        send(&app, json_request("PUT", &format!("/albums/{id}"), "{}")).await;
    }

    let resp = send(&app, empty_request("GET", "/albums/_all_docs?startkey=%22b%22&endkey=%22c%22")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let ids: Vec<&str> = body["rows"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["b", "c"]);
    assert_eq!(body["total_rows"], 4);
}

#[tokio::test]
async fn bulk_docs_reports_each_write() {
    let app = with_db("albums").await;
    send(&app, json_request("PUT", "/albums/taken", "{}")).await;

    let resp = send(
        &app,
        json_request("POST", "/albums/_bulk_docs", r#"{"docs":[{"_id":"fresh"},{"_id":"taken"}]}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let results = body_json(resp).await;
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["error"], "conflict");
}

#[tokio::test]
async fn find_filters_and_projects() {
    let app = with_db("albums").await;
    send(&app, json_request("PUT", "/albums/one", r#"{"year":1999,"title":"One"}"#)).await;
    send(&app, json_request("PUT", "/albums/two", r#"{"year":2005,"title":"Two"}"#)).await;

    let resp = send(
        &app,
        json_request(
            "POST",
            "/albums/_find",
            r#"{"selector":{"year":{"$gt":2000}},"fields":["title"]}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["docs"], json!([{"title": "Two"}]));

    let resp = send(&app, json_request("POST", "/albums/_find", r#"{"limit":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- indexes ---

#[tokio::test]
async fn index_lifecycle() {
    let app = with_db("albums").await;

    let resp = send(
        &app,
        json_request("POST", "/albums/_index", r#"{"index":{"fields":["year"]},"ddoc":"by-year","name":"year"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["result"], "created");

    let resp = send(&app, empty_request("GET", "/albums/_index")).await;
    assert_eq!(body_json(resp).await["total_rows"], 2);

    let resp = send(&app, empty_request("DELETE", "/albums/_index/by-year/json/year")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, empty_request("DELETE", "/albums/_index/by-year/json/year")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- design documents ---

#[tokio::test]
async fn view_lists_plain_documents() {
    let app = with_db("albums").await;
    send(
        &app,
        json_request(
            "PUT",
            "/albums/_design/lists",
            r#"{"views":{"all":{"map":"function (doc) { emit(doc._id, null) }"}}}"#,
        ),
    )
    .await;
    send(&app, json_request("PUT", "/albums/one", "{}")).await;

    let resp = send(&app, empty_request("GET", "/albums/_design/lists/_view/all")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total_rows"], 1);
    assert_eq!(body["rows"][0]["id"], "one");

    let resp = send(&app, empty_request("GET", "/albums/_design/lists/_view/other")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, empty_request("GET", "/albums/_design/lists/_info")).await;
    assert_eq!(body_json(resp).await["name"], "lists");
}

// --- attachments ---

#[tokio::test]
async fn attachment_lifecycle() {
    let app = with_db("albums").await;
    let resp = send(&app, json_request("PUT", "/albums/cover", "{}")).await;
    let rev = body_json(resp).await["rev"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/albums/cover/front.txt?rev={rev}"))
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body("hello".to_string())
        .unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let rev = body_json(resp).await["rev"].as_str().unwrap().to_string();
    assert!(rev.starts_with("2-"));

    let resp = send(&app, empty_request("GET", "/albums/cover/front.txt")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(body_bytes(resp).await.as_ref(), b"hello");

    let resp = send(&app, empty_request("DELETE", "/albums/cover/front.txt?rev=1-stale")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(&app, empty_request("DELETE", &format!("/albums/cover/front.txt?rev={rev}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, empty_request("GET", "/albums/cover/front.txt")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
