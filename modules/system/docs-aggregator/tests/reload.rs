#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Configuration reloads observed by subsequent requests

mod common;

use common::{openapi, serve};
use docs_aggregator::{AggregationEngine, ConfigStore};
use httpmock::prelude::*;
use std::sync::Arc;

fn config_yaml(address: &str, document_path: &str) -> String {
    format!(
        r"
clusters:
  A:
    destinations:
      d1:
        address: {address}
        sources:
          - document_paths: [{document_path}]
"
    )
}

#[tokio::test]
async fn test_snapshot_swap_is_seen_by_next_request() {
    let server = MockServer::start();
    serve(&server, "/v1.json", &openapi("V1", &[("/v1", &["get"])]));
    serve(&server, "/v2.json", &openapi("V2", &[("/v2", &["get"])]));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.yaml");
    std::fs::write(&path, config_yaml(&server.base_url(), "/v1.json")).unwrap();

    let store = Arc::new(ConfigStore::from_path(&path).unwrap());
    let engine = AggregationEngine::new(Arc::clone(&store));

    let before = engine.aggregate("A").await.unwrap();
    assert!(before.document.paths.contains_key("/v1"));

    std::fs::write(&path, config_yaml(&server.base_url(), "/v2.json")).unwrap();
    let snapshot = store.reload_from_path(&path).unwrap();
    assert_eq!(snapshot.generation, 1);

    let after = engine.aggregate("A").await.unwrap();
    assert!(after.document.paths.contains_key("/v2"));
    assert!(!after.document.paths.contains_key("/v1"));
}

#[tokio::test]
async fn test_broken_reload_keeps_serving_previous_snapshot() {
    let server = MockServer::start();
    serve(&server, "/v1.json", &openapi("V1", &[("/v1", &["get"])]));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.yaml");
    std::fs::write(&path, config_yaml(&server.base_url(), "/v1.json")).unwrap();

    let store = Arc::new(ConfigStore::from_path(&path).unwrap());
    let engine = AggregationEngine::new(Arc::clone(&store));

    std::fs::write(&path, "clusters: [oops").unwrap();
    assert!(store.reload_from_path(&path).is_err());

    let outcome = engine.aggregate("A").await.unwrap();
    assert!(outcome.document.paths.contains_key("/v1"));
    assert_eq!(engine.document_names(), vec!["A"]);
}

#[tokio::test]
async fn test_removed_cluster_serves_base_document() {
    let server = MockServer::start();
    serve(&server, "/v1.json", &openapi("V1", &[("/v1", &["get"])]));

    let config = docs_aggregator::GatewayConfig::from_yaml_str(&config_yaml(&server.base_url(), "/v1.json")).unwrap();
    let store = Arc::new(ConfigStore::new(&config));
    let engine = AggregationEngine::new(Arc::clone(&store));
    assert_eq!(engine.aggregate("A").await.unwrap().document.paths.len(), 1);

    store.replace(&docs_aggregator::GatewayConfig::default());

    let outcome = engine.aggregate("A").await.unwrap();
    assert!(outcome.document.paths.is_empty());
    assert_eq!(outcome.document, engine.base_document());
}
