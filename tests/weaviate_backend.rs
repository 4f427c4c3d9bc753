//! End-to-end tests for the Weaviate backend against a mock Weaviate.
//!
//! The mock serves `GET /v1/schema/{class}` and `POST /v1/graphql` on an
//! ephemeral port and records every GraphQL document it receives, so the
//! tests can check both the merged passages and the traffic that produced
//! them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use weaviate_context::backend::weaviate::{WeaviateBackend, WeaviateError};
use weaviate_context::backend::Backend;
use weaviate_context::config::WeaviateConfig;
use weaviate_context::extend::{search_with_extension, ExtensionOptions, ExtensionRequest};
use weaviate_context::filter::WhereValue;

// ─── Mock Weaviate ──────────────────────────────────────────────────

struct MockWeaviate {
    rows: Vec<Value>,
    ranking: Vec<&'static str>,
    queries: Mutex<Vec<String>>,
}

impl MockWeaviate {
    fn row(&self, id: &str) -> Option<&Value> {
        self.rows.iter().find(|r| r["doc_chunk_id"] == id)
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn point_fetches(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .queries()
            .iter()
            .filter_map(|q| equal_target(q))
            .collect();
        ids.sort();
        ids
    }
}

fn row(id: &str, content: &str, page: Option<Value>) -> Value {
    let mut r = json!({ "doc_chunk_id": id, "content": content, "source": "report.pdf" });
    if let Some(page) = page {
        r["page_number"] = page;
    }
    r
}

/// The composite id of a point fetch, if `query` is one.
fn equal_target(query: &str) -> Option<String> {
    let marker = "path: [\"doc_chunk_id\"], operator: Equal, valueText: \"";
    let start = query.find(marker)? + marker.len();
    let end = query[start..].find('"')?;
    Some(query[start..start + end].to_string())
}

fn collection_of(query: &str) -> &str {
    ["Plain", "Paged", "Broken"]
        .into_iter()
        .find(|c| query.contains(&format!("{}(", c)))
        .unwrap_or("Unknown")
}

fn limit_of(query: &str) -> usize {
    query
        .split("limit: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

async fn handle_schema(Path(class): Path<String>) -> Response {
    match class.as_str() {
        "Paged" => Json(json!({
            "class": "Paged",
            "properties": [{ "name": "content" }, { "name": "page_number" }]
        }))
        .into_response(),
        "Plain" | "Broken" => Json(json!({
            "class": class,
            "properties": [{ "name": "content" }, { "name": "source" }]
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_graphql(
    State(mock): State<Arc<MockWeaviate>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    mock.queries.lock().unwrap().push(query.clone());
    let collection = collection_of(&query);

    if collection == "Broken" {
        return Json(json!({ "errors": [{ "message": "class Broken is misconfigured" }] }));
    }

    if query.contains("Aggregate") {
        let prefix_start = query.find("valueText: \"").unwrap() + "valueText: \"".len();
        let prefix = query[prefix_start..].split('*').next().unwrap().to_string();
        let count = mock
            .rows
            .iter()
            .filter(|r| r["doc_chunk_id"].as_str().unwrap().starts_with(&prefix))
            .count();
        return Json(json!({
            "data": { "Aggregate": keyed(collection, json!([{ "meta": { "count": count } }])) }
        }));
    }

    let rows: Vec<Value> = if query.contains("hybrid:") {
        mock.ranking
            .iter()
            .filter_map(|id| mock.row(id).cloned())
            .take(limit_of(&query))
            .collect()
    } else if let Some(id) = equal_target(&query) {
        mock.row(&id).cloned().into_iter().collect()
    } else {
        Vec::new()
    };

    Json(json!({ "data": { "Get": keyed(collection, Value::Array(rows)) } }))
}

fn keyed(key: &str, value: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

async fn spawn_mock(rows: Vec<Value>, ranking: Vec<&'static str>) -> (String, Arc<MockWeaviate>) {
    let mock = Arc::new(MockWeaviate {
        rows,
        ranking,
        queries: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/v1/schema/{class}", get(handle_schema))
        .route("/v1/graphql", post(handle_graphql))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn backend(url: &str) -> WeaviateBackend {
    WeaviateBackend::new(&WeaviateConfig {
        url: url.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn request(collection: &str, top_k: u64, ext_k: u64) -> ExtensionRequest {
    ExtensionRequest {
        collection: collection.to_string(),
        query: "emission factors".to_string(),
        where_filter: None,
        top_k,
        ext_k,
    }
}

fn document_rows() -> Vec<Value> {
    vec![
        row("D1_0", "A", None),
        row("D1_1", "x", None),
        row("D1_2", "y", None),
        row("D1_3", "z", None),
        row("D1_4", "B", None),
        row("D1_5", "C", None),
        row("D1_6", "D", None),
    ]
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_context_extension_over_graphql() {
    let (url, mock) = spawn_mock(document_rows(), vec!["D1_5"]).await;
    let backend = backend(&url);

    let passages = search_with_extension(&backend, &request("Plain", 5, 1), &ExtensionOptions::default())
        .await
        .unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].content, "BCD");
    assert_eq!(passages[0].source, "report.pdf");
    assert_eq!(passages[0].page_number, None);

    assert_eq!(mock.point_fetches(), vec!["D1_4", "D1_6"]);
    let queries = mock.queries();
    assert!(queries.iter().any(|q| q.contains("Aggregate") && q.contains("D1_*")));
    assert!(queries
        .iter()
        .filter(|q| q.contains("Get"))
        .all(|q| !q.contains("page_number")));
}

#[tokio::test]
async fn test_last_chunk_not_fetched_past_end() {
    let (url, mock) = spawn_mock(document_rows(), vec!["D1_6"]).await;
    let backend = backend(&url);

    let passages = search_with_extension(&backend, &request("Plain", 5, 2), &ExtensionOptions::default())
        .await
        .unwrap();

    assert_eq!(passages[0].content, "BCD");
    assert_eq!(mock.point_fetches(), vec!["D1_4", "D1_5"]);
}

#[tokio::test]
async fn test_no_extension_issues_no_fetches() {
    let (url, mock) = spawn_mock(document_rows(), vec!["D1_4", "D1_0"]).await;
    let backend = backend(&url);

    let passages = search_with_extension(&backend, &request("Plain", 5, 0), &ExtensionOptions::default())
        .await
        .unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].content, "AB");
    // One hybrid search, nothing else.
    assert_eq!(mock.queries().len(), 1);
}

#[tokio::test]
async fn test_page_grouping_with_float_pages() {
    let rows = vec![
        row("D1_2", "first", Some(json!(1.0))),
        row("D1_9", "second", Some(json!(2))),
    ];
    let (url, mock) = spawn_mock(rows, vec!["D1_2", "D1_9"]).await;
    let backend = backend(&url);

    let passages = search_with_extension(&backend, &request("Paged", 5, 0), &ExtensionOptions::default())
        .await
        .unwrap();

    let mut pages: Vec<(Option<i64>, String)> = passages
        .into_iter()
        .map(|p| (p.page_number, p.content))
        .collect();
    pages.sort();
    assert_eq!(
        pages,
        vec![
            (Some(1), "first".to_string()),
            (Some(2), "second".to_string())
        ]
    );
    assert!(mock.queries()[0].contains("page_number"));
}

#[tokio::test]
async fn test_top_k_limits_hits() {
    let (url, _mock) = spawn_mock(document_rows(), vec!["D1_0", "D1_2", "D1_4"]).await;
    let backend = backend(&url);

    let passages = search_with_extension(&backend, &request("Plain", 2, 0), &ExtensionOptions::default())
        .await
        .unwrap();

    assert_eq!(passages[0].content, "Ay");
}

#[tokio::test]
async fn test_filter_reaches_every_request() {
    let (url, mock) = spawn_mock(document_rows(), vec!["D1_5"]).await;
    let backend = backend(&url);

    let filter: WhereValue =
        json!({ "path": ["source"], "operator": "Equal", "valueText": "report.pdf" }).into();
    let req = ExtensionRequest {
        where_filter: Some(filter),
        ..request("Plain", 5, 1)
    };
    search_with_extension(&backend, &req, &ExtensionOptions::default())
        .await
        .unwrap();

    let queries = mock.queries();
    let gets: Vec<&String> = queries.iter().filter(|q| q.contains("Get")).collect();
    assert_eq!(gets.len(), 3);
    assert!(gets.iter().all(|q| q.contains("valueText: \"report.pdf\"")));
    assert!(gets[1..].iter().all(|q| q.contains("operator: And")));
}

#[tokio::test]
async fn test_graphql_errors_are_fatal() {
    let (url, _mock) = spawn_mock(document_rows(), vec!["D1_5"]).await;
    let backend = backend(&url);

    let err = search_with_extension(&backend, &request("Broken", 5, 1), &ExtensionOptions::default())
        .await
        .unwrap_err();

    match err.downcast_ref::<WeaviateError>() {
        Some(WeaviateError::GraphQl(msg)) => assert!(msg.contains("misconfigured")),
        other => panic!("expected GraphQL error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_fails_open() {
    let (url, _mock) = spawn_mock(Vec::new(), Vec::new()).await;
    let backend = backend(&url);

    assert!(backend.has_page_number("Paged").await);
    assert!(!backend.has_page_number("Plain").await);
    assert!(!backend.has_page_number("Missing").await);

    // Nothing listens on port 1.
    let unreachable = self::backend("http://127.0.0.1:1");
    assert!(!unreachable.has_page_number("Paged").await);
}

#[tokio::test]
async fn test_unreachable_backend_fails_search() {
    let unreachable = backend("http://127.0.0.1:1");
    let err = search_with_extension(&unreachable, &request("Plain", 5, 0), &ExtensionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WeaviateError>(),
        Some(WeaviateError::Http(_))
    ));
}
