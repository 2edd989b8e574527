#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for the aggregator integration tests

use docs_aggregator::{AggregationEngine, ConfigStore, GatewayConfig};
use httpmock::prelude::*;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Minimal upstream document; every operation's summary is `"<title> <METHOD> <path>"`.
pub fn openapi(title: &str, paths: &[(&str, &[&str])]) -> Value {
    let mut path_items = Map::new();
    for (path, methods) in paths {
        let mut item = Map::new();
        for method in *methods {
            item.insert(
                method.to_ascii_lowercase(),
                json!({
                    "summary": format!("{title} {} {path}", method.to_ascii_uppercase()),
                    "responses": { "200": { "description": "ok" } }
                }),
            );
        }
        path_items.insert((*path).to_owned(), Value::Object(item));
    }
    json!({
        "openapi": "3.0.1",
        "info": { "title": title, "version": "1" },
        "paths": path_items,
    })
}

/// Serve `document` as JSON at `path`.
pub fn serve<'a>(server: &'a MockServer, path: &str, document: &Value) -> httpmock::Mock<'a> {
    let body = document.to_string();
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    })
}

pub fn engine(yaml: &str) -> AggregationEngine {
    let config = GatewayConfig::from_yaml_str(yaml).expect("valid test configuration");
    AggregationEngine::new(Arc::new(ConfigStore::new(&config)))
}

/// Summary of the `method` operation at `path` in a serialized output document.
pub fn summary(document: &Value, path: &str, method: &str) -> Option<String> {
    document["paths"][path][method]["summary"]
        .as_str()
        .map(str::to_owned)
}

/// Sorted `(path, method)` pairs of a serialized output document.
pub fn operations(document: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(paths) = document["paths"].as_object() {
        for (path, item) in paths {
            for method in ["get", "put", "post", "delete", "options", "head", "patch", "trace"] {
                if item.get(method).is_some() {
                    pairs.push((path.clone(), method.to_owned()));
                }
            }
        }
    }
    pairs.sort();
    pairs
}
