//! Tests for multi-source table search.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use quarry::datasource::Column;
use quarry::error::QuarryError;
use quarry::search::{SearchEngine, SearchStrategy};
use quarry::tools::ToolExecutionContext;

use common::*;

fn names(hits: &[quarry::search::SearchHit]) -> Vec<String> {
    hits.iter().map(|h| h.table.to_string()).collect()
}

#[tokio::test]
async fn all_source_scan_merges_by_score_then_name() {
    let sources = registry(vec![
        shop_database("C", shop_connection()),
        shop_database("A", shop_connection()),
        down_database("B"),
    ]);
    let engine = SearchEngine::default();
    let hits = engine
        .scan(&sources, None, "orders", SearchStrategy::Tfidf)
        .await
        .unwrap();
    assert_eq!(names(&hits), vec!["A.public.orders", "C.public.orders"]);
    assert!(!engine.is_indexed("B"));
}

#[tokio::test]
async fn targeted_scan_of_unreachable_source_fails() {
    let sources = registry(vec![down_database("B")]);
    let err = SearchEngine::default()
        .scan(&sources, Some("B"), "orders", SearchStrategy::Fuzzy)
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Connection { .. }));
}

#[tokio::test]
async fn results_are_truncated_to_the_limit() {
    let conn = shop_connection();
    for i in 0..5 {
        conn.add_table(&format!("archive.orders_{i}"), vec![], vec![]);
    }
    let sources = registry(vec![shop_database("A", conn)]);
    let hits = SearchEngine::new(3)
        .scan(&sources, Some("A"), "orders", SearchStrategy::Fuzzy)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn regex_ranks_full_matches_first() {
    let conn = shop_connection();
    conn.add_table("public.orders_archive", vec![], vec![]);
    let sources = registry(vec![shop_database("A", conn)]);
    let hits = SearchEngine::default()
        .scan(&sources, Some("A"), r"public\.orders", SearchStrategy::Regex)
        .await
        .unwrap();
    assert_eq!(names(&hits), vec!["A.public.orders", "A.public.orders_archive"]);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].score, 0.5);
}

#[tokio::test]
async fn empty_results_are_not_errors() {
    let sources = registry(vec![shop_database("A", shop_connection())]);
    let hits = SearchEngine::default()
        .scan(&sources, Some("A"), "invoices", SearchStrategy::Tfidf)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn inspected_columns_feed_tfidf() {
    let catalog = catalog(registry(vec![shop_database("A", shop_connection())]));
    let ctx = ToolExecutionContext::default();
    let scan = call("scan", json!({"source": "A", "query": "name"}));

    let before = catalog.execute(&scan, &ctx).await.unwrap();
    assert_eq!(before["results"], json!([]));

    catalog
        .execute(
            &call("inspect", json!({"source": "A", "table": "public.customers"})),
            &ctx,
        )
        .await
        .unwrap();
    let after = catalog.execute(&scan, &ctx).await.unwrap();
    assert_eq!(after["results"][0]["table"], "A.public.customers");
}

#[tokio::test]
async fn discover_rebuilds_a_stale_index() {
    let conn = shop_connection();
    let catalog = catalog(registry(vec![shop_database("A", conn.clone())]));
    let ctx = ToolExecutionContext::default();
    let scan = call("scan", json!({"source": "A", "query": "refunds"}));

    catalog.execute(&scan, &ctx).await.unwrap();
    conn.add_table(
        "public.refunds",
        vec![Column::new("id", "integer").key()],
        vec![],
    );
    let stale = catalog.execute(&scan, &ctx).await.unwrap();
    assert_eq!(stale["results"], json!([]));

    catalog.execute(&call("discover", json!({})), &ctx).await.unwrap();
    let fresh = catalog.execute(&scan, &ctx).await.unwrap();
    assert_eq!(fresh["results"][0]["table"], "A.public.refunds");
}
