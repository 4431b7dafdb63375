//! Tests for API and library sources and registry construction.

mod common;

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quarry::config::{QuarryConfig, SourceConfig};
use quarry::datasource::{ApiSource, DataSource, DriverRegistry, SourceKind, SourceRegistry};
use quarry::error::QuarryError;

fn orders_api() -> serde_json::Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "orders", "version": "1"},
        "paths": {
            "/orders": {
                "get": {"parameters": [{"name": "status", "in": "query", "schema": {"type": "string"}}]},
                "post": {"requestBody": {"required": true}}
            },
            "/orders/{id}": {
                "get": {"parameters": [{"name": "id", "in": "path", "schema": {"type": "integer"}}]}
            }
        }
    })
}

async fn serve_orders_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_api()))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn load(server: &MockServer) -> ApiSource {
    let headers = BTreeMap::from([("x-tenant".to_string(), "acme".to_string())]);
    let params = BTreeMap::from([("api_version".to_string(), "2".to_string())]);
    ApiSource::load(
        "orders",
        &format!("{}/openapi.json", server.uri()),
        headers,
        params,
        100,
    )
    .await
}

#[tokio::test]
async fn api_endpoints_are_discovered_from_the_document() {
    let server = serve_orders_api().await;
    let source = load(&server).await;

    assert!(source.test().await);
    let mut tables: Vec<String> = source
        .discover()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.qualified_name)
        .collect();
    tables.sort();
    assert_eq!(tables, vec!["GET /orders", "GET /orders/{id}", "POST /orders"]);

    let schema = source.inspect("GET /orders/{id}").await.unwrap();
    assert_eq!(schema.columns[0].column_name, "id");
    assert!(schema.columns[0].is_key);
}

#[tokio::test]
async fn api_sample_injects_headers_and_params() {
    let server = serve_orders_api().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("x-tenant", "acme"))
        .and(query_param("api_version", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "status": "open"},
            {"id": 2, "status": "shipped"},
            {"id": 3, "status": "open"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let source = load(&server).await;
    let rows = source.sample("GET /orders", 2).await.unwrap();
    assert_eq!(rows.rows.len(), 2);
    assert_eq!(rows.row_count, 3);
    assert!(rows.truncated);
    assert!(rows.columns.contains(&"status".to_string()));
}

#[tokio::test]
async fn api_query_keeps_the_statement_query_string() {
    let server = serve_orders_api().await;
    Mock::given(method("GET"))
        .and(path("/orders/7"))
        .and(query_param("expand", "lines"))
        .and(query_param("api_version", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "total": 12.5})))
        .expect(1)
        .mount(&server)
        .await;

    let source = load(&server).await;
    let rows = source.query("GET /orders/7?expand=lines").await.unwrap();
    assert_eq!(rows.rows.len(), 1);
    let total = rows.columns.iter().position(|c| c == "total").unwrap();
    assert_eq!(rows.rows[0][total], json!(12.5));
}

#[tokio::test]
async fn api_query_keeps_repeated_parameters() {
    let server = serve_orders_api().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(|request: &wiremock::Request| {
            request.url.query() == Some("id=1&id=2&api_version=2")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .mount(&server)
        .await;

    let source = load(&server).await;
    let rows = source.query("GET /orders?id=1&id=2").await.unwrap();
    assert_eq!(rows.rows.len(), 2);
}

#[tokio::test]
async fn api_writes_are_rejected_without_a_request() {
    let server = serve_orders_api().await;
    let source = load(&server).await;

    let err = source.query("POST /orders").await.unwrap_err();
    assert!(matches!(err, QuarryError::ReadOnlyViolation(_)));
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1, "only the document fetch should reach the server");
}

#[tokio::test]
async fn api_error_responses_are_backend_errors() {
    let server = serve_orders_api().await;
    Mock::given(method("GET"))
        .and(path("/orders/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("order not found"))
        .mount(&server)
        .await;

    let source = load(&server).await;
    match source.query("GET /orders/404").await {
        Err(QuarryError::Backend { source_id, message }) => {
            assert_eq!(source_id, "orders");
            assert_eq!(message, "HTTP 404: order not found");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_document_leaves_the_source_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = ApiSource::load(
        "ghost",
        &format!("{}/openapi.json", server.uri()),
        BTreeMap::new(),
        BTreeMap::new(),
        100,
    )
    .await;
    assert!(!source.test().await);
    assert!(matches!(
        source.discover().await,
        Err(QuarryError::Connection { .. })
    ));
}

#[tokio::test]
async fn registry_builds_each_source_kind_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let spec_path = dir.path().join("billing.yaml");
    std::fs::write(
        &spec_path,
        "openapi: 3.0.0\nservers:\n  - url: https://billing.example.com\npaths:\n  /invoices:\n    get: {}\n",
    )
    .unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("glossary.md"), "ARR: annual recurring revenue\n").unwrap();

    let spec_url = url::Url::from_file_path(&spec_path).unwrap().to_string();
    let docs_url = url::Url::from_directory_path(&docs).unwrap().to_string();
    let config = QuarryConfig::new()
        .with_source(SourceConfig::named("billing", spec_url))
        .with_source(SourceConfig::named("docs", docs_url))
        .with_source(SourceConfig::named("shop", "memory://shop"));

    let mut drivers = DriverRegistry::new();
    drivers.register(std::sync::Arc::new(common::MemoryDriver {
        connection: common::shop_connection(),
    }));
    let registry = SourceRegistry::from_config(&config, &drivers).await.unwrap();

    let kinds: Vec<SourceKind> = registry.iter().map(|s| s.kind()).collect();
    assert_eq!(
        kinds,
        vec![SourceKind::Api, SourceKind::Library, SourceKind::Database]
    );

    let billing = registry.get("billing").unwrap();
    assert!(billing.test().await);
    assert_eq!(billing.discover().await.unwrap()[0].qualified_name, "GET /invoices");

    let docs = registry.get("docs").unwrap();
    let sample = docs.sample("glossary.md", 5).await.unwrap();
    assert_eq!(sample.rows[0][1], "ARR: annual recurring revenue");

    let shop = registry.get("shop").unwrap();
    assert_eq!(shop.discover().await.unwrap().len(), 2);
}
